//! Tests for `image` extraction from rendered resources

use carbide::images::{collect_images, walk};

const DEPLOYMENT: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: rancher
spec:
  template:
    spec:
      initContainers:
        - name: init
          image: busybox:1.36
      containers:
        - name: rancher
          image: rancher/rancher:v2.10.1
          env:
            - name: CATTLE_IMAGE
              value: ignored
        - name: sidecar
          image:
            nested: not-a-string
"#;

#[test]
fn test_collect_images_from_yaml() {
    let doc: serde_yaml::Value = serde_yaml::from_str(DEPLOYMENT).unwrap();
    assert_eq!(
        collect_images(&doc),
        vec!["busybox:1.36", "rancher/rancher:v2.10.1"]
    );
}

#[test]
fn test_collect_images_from_json() {
    let doc = serde_json::json!({
        "kind": "CronJob",
        "spec": {
            "jobTemplate": {
                "spec": {
                    "template": {
                        "spec": {
                            "containers": [
                                {"name": "a", "image": "alpine:3.20"},
                                {"name": "b", "image": 42}
                            ]
                        }
                    }
                }
            }
        }
    });
    assert_eq!(collect_images(&doc), vec!["alpine:3.20"]);
}

#[test]
fn test_collect_images_from_scalar_is_empty() {
    let doc = serde_yaml::Value::String("image: nginx".to_string());
    assert!(collect_images(&doc).is_empty());
}

#[test]
fn test_walk_visits_every_key() {
    let doc: serde_yaml::Value = serde_yaml::from_str("a: {b: 1, c: [{d: 2}]}").unwrap();
    let mut keys = Vec::new();
    walk(&doc, &mut |key: &str, _value: &serde_yaml::Value| keys.push(key.to_string()));
    assert_eq!(keys, vec!["a", "b", "c", "d"]);
}
