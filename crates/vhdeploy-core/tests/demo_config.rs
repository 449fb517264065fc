use std::path::PathBuf;

use vhdeploy_core::verify::load_payload;
use vhdeploy_core::{EndpointSpec, ProbeKind};

fn demos() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos")
}

#[test]
fn demo_config_declares_predict_endpoint() {
    let spec = EndpointSpec::load(&demos().join("valohai.yaml"), None).expect("demo config");

    assert_eq!(spec.endpoint_name, "predict");
    let paths: Vec<&str> = spec.required_paths().into_iter().collect();
    assert_eq!(
        paths,
        vec!["models/events/model.pkl", "models/events/vocab.json"]
    );
}

#[test]
fn demo_payloads_exist_for_every_probe_kind() {
    for kind in [ProbeKind::Relation, ProbeKind::Ner, ProbeKind::Event] {
        let payload = load_payload(&demos().join("test_payloads").join(kind.payload_file()))
            .expect("payload");
        assert!(payload["text"].is_string(), "{} payload", kind.as_str());
    }
}
