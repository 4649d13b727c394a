//! Image operation chain parsing
//!
//! An image path may carry a chain of operations after the file path:
//!
//! ```text
//! /tiles/dirt.png?hueshift=60?replace=aabbcc=000000;112233=ffffff?flipgridx=8
//! ```
//!
//! Each `?` starts an operation; its name ends at the first `=`, and its
//! arguments are separated by `=` or `;`.

use crate::error::Error;

/// An RGB triple.
pub type Rgb = [u8; 3];

/// One parsed image operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOperation {
    /// Rotate the hue of every pixel by this many degrees.
    HueShift(f64),
    /// Exact-match color substitution, `(from, to)` pairs in path order.
    Replace(Vec<(Rgb, Rgb)>),
    /// Mirror every tile of this width independently.
    FlipGridX(u32),
    /// An operation this engine does not implement. Kept for diagnostics only.
    Unsupported {
        /// Operation name.
        name: String,
        /// Raw arguments.
        args: Vec<String>,
    },
}

/// A base path plus the operations applied to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOpChain {
    base_path: String,
    operations: Vec<ImageOperation>,
}

impl ImageOpChain {
    /// Parse a full image path.
    ///
    /// Unsupported operations and malformed arguments are logged; the rest of
    /// the chain still applies.
    ///
    /// # Example
    ///
    /// ```
    /// use starassets::imaging::{ImageOpChain, ImageOperation};
    ///
    /// let chain = ImageOpChain::parse("/a.png?hueshift=90?flipgridx=16");
    /// assert_eq!(chain.base_path(), "/a.png");
    /// assert_eq!(
    ///     chain.operations(),
    ///     [ImageOperation::HueShift(90.0), ImageOperation::FlipGridX(16)]
    /// );
    /// ```
    pub fn parse(path: &str) -> Self {
        let mut parts = path.split('?');
        let base_path = parts.next().unwrap_or_default().to_string();

        let operations = parts
            .filter_map(|op| parse_operation(path, op))
            .collect();

        Self {
            base_path,
            operations,
        }
    }

    /// Path of the untransformed image.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Operations in path order.
    pub fn operations(&self) -> &[ImageOperation] {
        &self.operations
    }

    /// Whether the path carries no operation at all.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn parse_operation(path: &str, op: &str) -> Option<ImageOperation> {
    let mut tokens = op.split(['=', ';']);
    let name = tokens.next().unwrap_or_default();
    let args: Vec<&str> = tokens.collect();

    let parsed = match name {
        "hueshift" => args
            .first()
            .and_then(|arg| arg.trim().parse::<f64>().ok())
            .filter(|degrees| degrees.is_finite())
            .map(ImageOperation::HueShift),
        "replace" => parse_replace(&args).map(ImageOperation::Replace),
        "flipgridx" => args
            .first()
            .and_then(|arg| arg.trim().parse::<u32>().ok())
            .filter(|width| *width > 0)
            .map(ImageOperation::FlipGridX),
        _ => {
            tracing::warn!("{} ({})", Error::UnsupportedImageOperation(name.to_string()), path);
            return Some(ImageOperation::Unsupported {
                name: name.to_string(),
                args: args.iter().map(|arg| (*arg).to_string()).collect(),
            });
        }
    };

    if parsed.is_none() {
        tracing::warn!(
            "{} ({})",
            Error::InvalidImageArgument {
                op: name.to_string(),
                arg: args.join(";"),
            },
            path
        );
    }
    parsed
}

fn parse_replace(args: &[&str]) -> Option<Vec<(Rgb, Rgb)>> {
    if args.is_empty() || args.len() % 2 != 0 {
        return None;
    }

    args.chunks_exact(2)
        .map(|pair| Some((parse_hex_color(pair[0])?, parse_hex_color(pair[1])?)))
        .collect()
}

/// Parse a six digit hex color such as `ff8000`.
pub fn parse_hex_color(hex: &str) -> Option<Rgb> {
    let hex = hex.trim();
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}
