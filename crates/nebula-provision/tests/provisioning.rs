//! End-to-end provisioning against the in-memory store and signer.

use async_trait::async_trait;
use nebula_core::{
    CreateCaRequest, CreateNodeRequest, NetworkSettings, NodeRole, ProvisionError, ProxyMode,
};
use nebula_provision::signer::{CaParams, SignParams, SignerError};
use nebula_provision::{FakeSigner, ManagerConfig, MemoryStore, NodeProvisioner, Signer, Store};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    _data: TempDir,
    data_dir: std::path::PathBuf,
    store: Arc<MemoryStore>,
    signer: Arc<FakeSigner>,
    provisioner: NodeProvisioner,
}

fn harness(token: Option<&str>) -> Harness {
    let data = tempfile::tempdir().unwrap();
    let config = ManagerConfig {
        data_dir: data.path().to_path_buf(),
        api_base_url: "https://mgr.example.com".into(),
        static_token: token.map(ToString::to_string),
        ..ManagerConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let signer = Arc::new(FakeSigner::new());
    let provisioner = NodeProvisioner::new(store.clone(), signer.clone(), &config);
    Harness {
        data_dir: data.path().to_path_buf(),
        _data: data,
        store,
        signer,
        provisioner,
    }
}

async fn with_ca(h: &Harness) {
    h.provisioner
        .ca()
        .generate_or_replace(CreateCaRequest {
            name: "test-net".into(),
            description: String::new(),
            validity_days: 365,
        })
        .await
        .unwrap();
}

fn request(name: &str, role: &str, subnet: &str) -> CreateNodeRequest {
    CreateNodeRequest {
        name: name.into(),
        role: role.into(),
        subnet_ip: subnet.into(),
        ..CreateNodeRequest::default()
    }
}

#[tokio::test]
async fn test_create_requires_ca() {
    let h = harness(None);
    let err = h
        .provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::PreconditionFailed(_)));
    assert_eq!(h.signer.sign_calls(), 0);
    assert!(h.store.list_nodes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let h = harness(None);
    with_ca(&h).await;

    let bad_role = h
        .provisioner
        .create(request("web1", "relay", "10.10.0.5"))
        .await
        .unwrap_err();
    assert!(bad_role.is_validation());

    let bad_subnet = h
        .provisioner
        .create(request("web1", "standard", "10.10.0.5/40"))
        .await
        .unwrap_err();
    assert!(matches!(bad_subnet, ProvisionError::InvalidSubnet(_)));

    let bad_name = h
        .provisioner
        .create(request("../etc", "standard", "10.10.0.5"))
        .await
        .unwrap_err();
    assert!(bad_name.is_validation());

    assert!(h.store.list_nodes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_writes_artifacts() {
    let h = harness(None);
    with_ca(&h).await;

    let view = h
        .provisioner
        .create(CreateNodeRequest {
            tags: vec!["web".into(), " ".into()],
            proxy_mode: Some(" IPv6 ".into()),
            ..request("web1", "standard", "10.10.0.5")
        })
        .await
        .unwrap();

    assert_eq!(view.subnet_ip, "10.10.0.5/24");
    assert_eq!(view.subnet_host, "10.10.0.5");
    assert_eq!(view.port, 4242);
    assert_eq!(view.tags, ["web"]);
    assert_eq!(view.proxy_mode, Some(ProxyMode::Ipv6));
    assert!(view.install_command.contains("${NEBULA_ACCESS_TOKEN:?missing NEBULA_ACCESS_TOKEN}"));
    assert!(view
        .install_command
        .contains(&format!("https://mgr.example.com/api/nodes/{}/install-script", view.id)));

    let dir = h.data_dir.join("nodes").join("web1");
    for file in ["ca.crt", "web1.crt", "web1.key", "config.yml"] {
        assert!(dir.join(file).is_file(), "missing {file}");
    }
    let config = std::fs::read_to_string(dir.join("config.yml")).unwrap();
    assert!(config.contains("  ip: 10.10.0.5/24\n"));
    assert!(config.contains("am_lighthouse: false"));
}

#[tokio::test]
async fn test_unknown_proxy_mode_is_cleared() {
    let h = harness(None);
    with_ca(&h).await;

    let view = h
        .provisioner
        .create(CreateNodeRequest {
            proxy_mode: Some("socks5".into()),
            ..request("web1", "standard", "10.10.0.5")
        })
        .await
        .unwrap();
    assert_eq!(view.proxy_mode, None);
}

#[tokio::test]
async fn test_duplicate_name_keeps_first_node() {
    let h = harness(None);
    with_ca(&h).await;

    h.provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap();
    let err = h
        .provisioner
        .create(request("web1", "lighthouse", "10.10.0.6"))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(h.data_dir.join("nodes/web1/config.yml").is_file());
    assert_eq!(h.store.list_nodes().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_lighthouse_in_static_host_map() {
    let h = harness(None);
    with_ca(&h).await;

    h.provisioner
        .create(CreateNodeRequest {
            public_ip: Some("203.0.113.1".into()),
            ..request("lh1", "lighthouse", "10.10.0.1")
        })
        .await
        .unwrap();
    h.provisioner
        .create(request("lh2", "lighthouse", "10.10.0.2"))
        .await
        .unwrap();
    let web = h
        .provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap();

    let config = h.provisioner.config(web.id).await.unwrap();
    assert!(config.contains("static_host_map:\n  \"203.0.113.1:4242\": [\"10.10.0.1\"]\nlighthouse:\n"));
    assert!(config.contains("  hosts:\n    - \"10.10.0.1\"\n    - \"10.10.0.2\"\n"));
}

#[tokio::test]
async fn test_new_lighthouse_sees_itself() {
    let h = harness(None);
    with_ca(&h).await;

    h.provisioner
        .create(CreateNodeRequest {
            public_ip: Some("198.51.100.7".into()),
            port: Some(4343),
            ..request("lh1", "lighthouse", "10.10.0.1")
        })
        .await
        .unwrap();

    let config = std::fs::read_to_string(h.data_dir.join("nodes/lh1/config.yml")).unwrap();
    assert!(config.contains("\"198.51.100.7:4343\": [\"10.10.0.1\"]"));
    assert!(config.contains("am_lighthouse: true"));
    assert!(config.contains("  port: 4343\n"));
}

#[tokio::test]
async fn test_refresh_is_idempotent_for_config() {
    let h = harness(None);
    with_ca(&h).await;
    let web = h
        .provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap();

    let first = h.provisioner.artifacts(web.id).await.unwrap();
    let second = h.provisioner.artifacts(web.id).await.unwrap();

    assert_eq!(first.config, second.config);
    assert_eq!(first.ca_cert, second.ca_cert);
    assert_ne!(first.certificate, second.certificate);

    let stored = h.store.get_node(web.id).await.unwrap().unwrap();
    assert_eq!(stored.certificate_pem, second.certificate);
    let on_disk = std::fs::read_to_string(h.data_dir.join("nodes/web1/web1.crt")).unwrap();
    assert_eq!(on_disk, second.certificate);
}

#[tokio::test]
async fn test_refresh_follows_ca_rotation() {
    let h = harness(None);
    with_ca(&h).await;
    let web = h
        .provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap();

    with_ca(&h).await;
    let current = h.provisioner.ca().certificate().await.unwrap();
    let artifacts = h.provisioner.artifacts(web.id).await.unwrap();
    assert_eq!(artifacts.ca_cert, current);
}

#[tokio::test]
async fn test_reads_on_missing_node() {
    let h = harness(None);
    with_ca(&h).await;

    assert!(h.provisioner.config(99).await.unwrap_err().is_not_found());
    assert!(h.provisioner.bundle(99).await.unwrap_err().is_not_found());
    assert!(h.provisioner.delete(99).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_install_script_embeds_token() {
    let h = harness(Some("s3cret"));
    with_ca(&h).await;
    let web = h
        .provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap();

    assert!(web.install_command.contains("Bearer s3cret"));
    let script = h.provisioner.install_script(web.id).await.unwrap();
    assert!(script.contains("NEBULA_ACCESS_TOKEN=\"s3cret\"\n"));
    assert!(script.contains(&format!("NODE_ID={}\n", web.id)));
}

#[tokio::test]
async fn test_bundle_has_four_entries() {
    let h = harness(None);
    with_ca(&h).await;
    let web = h
        .provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap();

    let bytes = h.provisioner.bundle(web.id).await.unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(bytes.as_slice()));
    let names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["ca.crt", "web1.crt", "web1.key", "config.yml"]);
}

#[tokio::test]
async fn test_delete_removes_artifacts() {
    let h = harness(None);
    with_ca(&h).await;
    let web = h
        .provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap();
    let other = h
        .provisioner
        .create(request("web2", "standard", "10.10.0.6"))
        .await
        .unwrap();

    std::fs::remove_dir_all(h.data_dir.join("nodes/web2")).unwrap();

    h.provisioner.delete(web.id).await.unwrap();
    h.provisioner.delete(other.id).await.unwrap();

    assert!(!h.data_dir.join("nodes/web1").exists());
    assert!(h.store.list_nodes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_newest_first_with_legacy_fallback() {
    let h = harness(None);
    with_ca(&h).await;
    h.provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap();
    let second = h
        .provisioner
        .create(request("web2", "standard", "10.10.0.6"))
        .await
        .unwrap();

    // Simulate a row written before the split subnet fields existed.
    let mut legacy = h.store.get_node(second.id).await.unwrap().unwrap();
    legacy.subnet_cidr.clear();
    legacy.subnet_host.clear();
    legacy.subnet_ip = "10.10.0.6".into();
    h.store.update_node(&legacy).await.unwrap();

    let views = h.provisioner.list().await.unwrap();
    assert_eq!(views[0].name, "web2");
    assert_eq!(views[0].subnet_ip, "10.10.0.6/24");
    assert_eq!(views[0].subnet_host, "10.10.0.6");
    assert_eq!(views[1].name, "web1");

    // A refresh backfills and persists the split fields.
    h.provisioner.config(second.id).await.unwrap();
    let stored = h.store.get_node(second.id).await.unwrap().unwrap();
    assert_eq!(stored.subnet_cidr, "10.10.0.6/24");
    assert_eq!(stored.role, NodeRole::Standard);
}

/// Counts how many signing requests overlap.
#[derive(Default)]
struct OverlapSigner {
    inner: FakeSigner,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl Signer for OverlapSigner {
    async fn create_ca(&self, params: &CaParams<'_>) -> Result<(), SignerError> {
        self.inner.create_ca(params).await
    }

    async fn sign(&self, params: &SignParams<'_>) -> Result<(), SignerError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = self.inner.sign(params).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refreshes_of_one_node_are_serialized() {
    let data = tempfile::tempdir().unwrap();
    let config = ManagerConfig {
        data_dir: data.path().to_path_buf(),
        ..ManagerConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let signer = Arc::new(OverlapSigner::default());
    let provisioner = NodeProvisioner::new(store.clone(), signer.clone(), &config);
    provisioner
        .ca()
        .generate_or_replace(CreateCaRequest {
            name: "test-net".into(),
            ..CreateCaRequest::default()
        })
        .await
        .unwrap();
    let web = provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap();

    let (a, b, c) = tokio::join!(
        provisioner.config(web.id),
        provisioner.artifacts(web.id),
        provisioner.bundle(web.id),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(signer.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(signer.inner.sign_calls(), 4);
    let stored = store.get_node(web.id).await.unwrap().unwrap();
    let on_disk = std::fs::read_to_string(data.path().join("nodes/web1/web1.crt")).unwrap();
    assert_eq!(on_disk, stored.certificate_pem);
}

#[tokio::test]
async fn test_stored_oversized_validity_is_capped() {
    let h = harness(None);
    with_ca(&h).await;
    h.store
        .save_settings(NetworkSettings {
            certificate_validity_days: i64::MAX,
            ..NetworkSettings::default()
        })
        .await
        .unwrap();

    let web = h
        .provisioner
        .create(request("web1", "standard", "10.10.0.5"))
        .await
        .unwrap();
    h.provisioner.config(web.id).await.unwrap();
    assert_eq!(h.signer.sign_calls(), 2);
}
