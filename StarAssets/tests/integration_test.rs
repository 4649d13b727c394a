use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use pretty_assertions::assert_eq;
use serde_json::json;
use starassets::prelude::*;
use starfiles::package::{SimplePackageBuilder, SimplePackageCodec};
use starfiles::world::{SimpleWorldBuilder, SimpleWorldCodec};
use tempfile::tempdir;

fn png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

fn write(root: &Path, path: &str, bytes: &[u8]) {
    let full = root.join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, bytes).unwrap();
}

/// A small asset tree: loose files, a package, a mod package and hidden files.
fn asset_tree(root: &Path) {
    let sprite = RgbaImage::from_fn(4, 1, |x, _| Rgba([x as u8 * 50, 0, 0, 255]));

    write(root, "tiles/dirt.material", br#"{
        // Dirt is the most common material
        "materialId": 1,
        "frames": "dirt.png",
        "description": "http://not-a-comment"
    }"#);
    write(root, "tiles/dirt.png", &png(&sprite));
    write(root, "sfx/step.ogg", b"OggS");
    write(root, ".git/HEAD", b"ref: refs/heads/main");
    write(root, "tiles/.DS_Store", b"junk");

    let base = SimplePackageBuilder::new()
        .with_file("/objects/chest.object", br#"{"objectName": "chest"}"#.to_vec())
        .with_file("/objects/lamp.object", br#"{"objectName": "lamp"}"#.to_vec())
        .with_file(
            "/tiles/stone.material",
            br#"{"materialId": 2, "frames": "/tiles/dirt.png"}"#.to_vec(),
        )
        .build()
        .unwrap();
    write(root, "packed.pak", &base);

    let modded = SimplePackageBuilder::new()
        .with_file("/objects/lamp.object", br#"{"objectName": "lamp", "modded": true}"#.to_vec())
        .with_file("/objects/broken.object", b"{ oops".to_vec())
        .build()
        .unwrap();
    write(root, "mods/shiny.modpak", &modded);
}

fn manager(replicas: usize) -> AssetsManager {
    let config = AssetsConfig::new()
        .with_replicas(replicas)
        .with_read_batch_size(2)
        .with_time_calls(true);
    AssetsManager::spawn(config, Arc::new(SimplePackageCodec), Arc::new(SimpleWorldCodec)).unwrap()
}

async fn eventually<T>(mut check: impl FnMut() -> Option<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(value) = check() {
                return value;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ingest_and_query() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let temp = tempdir().unwrap();
    asset_tree(temp.path());

    let assets = manager(3);
    let report = assets.add_fs_root(temp.path()).await.unwrap();
    assert_eq!(report.files_added, 5);
    assert_eq!(report.files_failed, 0);

    // Loose files keep their virtual path; package entries use their inner path
    let step = assets.get_blob_url("/sfx/step.ogg").await.unwrap();
    assert_eq!(step.blob().mime(), Some("audio/ogg"));
    assert!(step.url().starts_with("blob:"));
    assert!(assets.get_blob_url("/objects/chest.object").await.is_ok());
    assert!(matches!(
        assets.get_blob_url("/packed.pak").await,
        Err(Error::PathNotIndexed(_))
    ));
    assert!(matches!(
        assets.get_blob_url("/.git/HEAD").await,
        Err(Error::PathNotIndexed(_))
    ));

    // Every replica sees the whole index
    for _ in 0..assets.client().replica_count() {
        let objects = assets.load_resources(".object").await.unwrap();
        let mut names: Vec<_> = objects.keys().cloned().collect();
        names.sort();
        assert_eq!(names, ["chest", "lamp"]);
    }

    let materials = assets.load_resources(".material").await.unwrap();
    assert_eq!(materials["1"].get_str("description"), Some("http://not-a-comment"));
    assert_eq!(materials["2"].path(), "/tiles/stone.material");
}

#[tokio::test]
async fn test_mod_package_overrides_base() {
    let assets = manager(1);
    let base = SimplePackageBuilder::new()
        .with_file("/objects/lamp.object", br#"{"objectName": "lamp"}"#.to_vec())
        .build()
        .unwrap();
    let modded = SimplePackageBuilder::new()
        .with_file("/objects/lamp.object", br#"{"objectName": "lamp", "modded": true}"#.to_vec())
        .build()
        .unwrap();

    assets
        .client()
        .add_file_list(
            "/",
            vec![
                HostedFile::new("base.pak", base),
                HostedFile::new("z.modpak", modded),
            ],
        )
        .await
        .unwrap();

    let lamp = assets.client().get_json("/objects/lamp.object").await.unwrap();
    assert_eq!(lamp.get("modded"), Some(&json!(true)));
}

#[tokio::test]
async fn test_loader_prefetches_images() {
    let temp = tempdir().unwrap();
    asset_tree(temp.path());

    let assets = manager(2);
    assets.add_fs_root(temp.path()).await.unwrap();

    let materials = assets.get_resource_loader(".material");
    materials.load_images(["1", "2"]);

    let dirt = eventually(|| materials.get("1")).await;
    let image = eventually(|| assets.get_image("/tiles/dirt.png")).await;
    assert_eq!(image.dimensions(), (4, 1));

    let tile = assets.get_tile_image(&dirt, "frames", 0).unwrap();
    assert!(Arc::ptr_eq(&tile, &image));

    let mirrored = assets.get_image("/tiles/dirt.png?flipgridx=2").unwrap();
    let reds: Vec<u8> = mirrored.pixels().map(|p| p[0]).collect();
    assert_eq!(reds, [50, 0, 150, 100]);
}

#[tokio::test]
async fn test_world_regions() {
    let assets = manager(2);
    let client = assets.client();

    let world = SimpleWorldBuilder::new(json!({"seed": 42}))
        .with_region(1, 3, 4, vec![1; 64])
        .with_entities(3, 4, json!([{"type": "tree"}]))
        .build()
        .unwrap();

    assert!(matches!(client.get_region(3, 4).await, Err(Error::WorldNotOpen)));
    assert_eq!(client.open_world(world.into()).await.unwrap(), json!({"seed": 42}));

    let region = client.get_region(3, 4).await.unwrap();
    assert_eq!(region.buffer.len(), 64);
    assert_eq!(region.entities, json!([{"type": "tree"}]));
}
