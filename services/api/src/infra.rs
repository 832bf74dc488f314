use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use retrofund::config::AppConfig;
use retrofund::error::AppError;
use retrofund::funding::{
    CollaboratorError, Collaborators, CsvMetricsProvider, SignatureVerifier, SnapshotIndexer,
    VoterAddress,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Development-only verifier. A signature is `<address>.<hex(message)>`; the address is
/// trusted once the embedded message matches the one being authorized.
#[derive(Debug, Default, Clone)]
pub(crate) struct DevSignatureVerifier;

impl DevSignatureVerifier {
    pub(crate) fn sign(address: &str, message: &str) -> String {
        format!("{address}.{}", hex::encode(message))
    }
}

#[async_trait]
impl SignatureVerifier for DevSignatureVerifier {
    async fn recover_signer(
        &self,
        message: &str,
        signature: &str,
    ) -> Result<VoterAddress, CollaboratorError> {
        let (address, encoded) = signature.split_once('.').ok_or_else(|| {
            CollaboratorError::Signature("expected <address>.<hex message>".to_string())
        })?;
        let signed = hex::decode(encoded)
            .map_err(|err| CollaboratorError::Signature(format!("message is not hex: {err}")))?;
        if signed != message.as_bytes() {
            return Err(CollaboratorError::Signature(
                "signature covers a different message".to_string(),
            ));
        }

        let signer = VoterAddress::new(address);
        if !signer.is_well_formed() {
            return Err(CollaboratorError::Signature(format!(
                "{signer} is not a valid address"
            )));
        }
        Ok(signer)
    }
}

/// Used in production until a real key-recovery backend is configured.
#[derive(Debug, Default, Clone)]
pub(crate) struct RejectingSignatureVerifier;

#[async_trait]
impl SignatureVerifier for RejectingSignatureVerifier {
    async fn recover_signer(
        &self,
        _message: &str,
        _signature: &str,
    ) -> Result<VoterAddress, CollaboratorError> {
        Err(CollaboratorError::Signature(
            "no signature verifier configured".to_string(),
        ))
    }
}

/// Wires the file-backed collaborators named in the configuration. Unset paths fall back to
/// empty snapshots so the service still starts.
pub(crate) fn collaborators_from_config(config: &AppConfig) -> Result<Collaborators, AppError> {
    let indexer = match &config.snapshots.indexer_path {
        Some(path) => SnapshotIndexer::from_path(path)?,
        None => {
            warn!("APP_INDEXER_SNAPSHOT not set; no rounds will resolve");
            SnapshotIndexer::default()
        }
    };
    let metrics = match &config.snapshots.metrics_path {
        Some(path) => CsvMetricsProvider::from_path(path)?,
        None => {
            warn!("APP_METRICS_SNAPSHOT not set; every score will be missing");
            CsvMetricsProvider::default()
        }
    };

    let signatures: Arc<dyn SignatureVerifier> = if config.environment.is_production() {
        Arc::new(RejectingSignatureVerifier)
    } else {
        Arc::new(DevSignatureVerifier)
    };

    Ok(Collaborators {
        indexer: Arc::new(indexer),
        metrics: Arc::new(metrics),
        signatures,
    })
}
