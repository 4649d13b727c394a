use std::sync::Arc;

use serde_json::json;
use starfiles::prelude::*;

#[test]
fn test_package_through_codec_trait() {
    let codec: Arc<dyn PackageCodec> = Arc::new(SimplePackageCodec);

    let bytes = SimplePackageBuilder::new()
        .with_file("/tiles/dirt.material", br#"{"materialId": 1}"#.to_vec())
        .with_file("/tiles/dirt.png", vec![0x89, b'P', b'N', b'G'])
        .build()
        .unwrap();
    let package = codec.open(bytes.into()).unwrap();

    assert_eq!(package.index(), ["/tiles/dirt.material", "/tiles/dirt.png"]);
    assert_eq!(package.get("/tiles/dirt.png").unwrap().as_ref(), b"\x89PNG");
    assert!(matches!(
        package.get("/tiles/grass.png"),
        Err(Error::FileNotFoundInPackage(_))
    ));
}

#[test]
fn test_garbage_is_not_a_package() {
    let result = SimplePackageCodec.open(bytes::Bytes::from_static(b"PK\x03\x04 zip file"));
    assert!(matches!(result, Err(Error::InvalidPackageMagic(_))));
}

#[test]
fn test_world_through_codec_trait() {
    let codec: Arc<dyn WorldCodec> = Arc::new(SimpleWorldCodec);

    let bytes = SimpleWorldBuilder::new(json!({"size": [3000, 2000]}))
        .with_region(1, 10, 4, vec![7; 16])
        .with_region(2, 10, 4, vec![9; 4])
        .with_entities(10, 4, json!([{"type": "monster"}]))
        .build()
        .unwrap();
    let world = codec.open(bytes.into()).unwrap();

    assert_eq!(world.metadata().unwrap(), json!({"size": [3000, 2000]}));
    assert_eq!(world.region_data(1, 10, 4).unwrap(), vec![7; 16]);
    assert_eq!(world.region_data(2, 10, 4).unwrap(), vec![9; 4]);
    assert_eq!(world.entities(10, 4).unwrap(), json!([{"type": "monster"}]));
    assert!(world.region_data(1, 0, 0).is_err());
}
