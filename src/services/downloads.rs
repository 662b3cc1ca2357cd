use crate::database::{DownloadRepository, ProductRepository};
use crate::error::{ApiError, ApiResult};
use crate::services::audit::AuditRecorder;
use crate::services::storage::UrlSigner;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct IssuedDownload {
    pub url: String,
    pub version: String,
    pub expires_in_secs: u64,
}

/// Issues signed download URLs against a live entitlement token. The
/// token use is spent and the access logged in one transaction, so an
/// issued URL always has a matching log row.
#[derive(Clone)]
pub struct DownloadService {
    downloads: DownloadRepository,
    products: ProductRepository,
    signer: UrlSigner,
    audit: AuditRecorder,
}

impl DownloadService {
    pub fn new(
        downloads: DownloadRepository,
        products: ProductRepository,
        signer: UrlSigner,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            downloads,
            products,
            signer,
            audit,
        }
    }

    pub async fn issue(
        &self,
        account_id: Uuid,
        product_id: Uuid,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> ApiResult<IssuedDownload> {
        let token = self
            .downloads
            .find_usable_token(account_id, product_id)
            .await
            .map_err(|err| match err {
                e if e.is_not_found() => ApiError::NoEntitlement,
                e => e.into(),
            })?;

        let version = self
            .products
            .latest_file_version(product_id)
            .await
            .map_err(|err| match err {
                e if e.is_not_found() => ApiError::NoFileVersion,
                e => e.into(),
            })?;

        // Spend the use before handing out the URL. A concurrent request
        // that drains the last use loses here and gets no link.
        let rows = self
            .downloads
            .consume_token_and_log(token.id, account_id, product_id, client_ip, user_agent)
            .await?;
        if rows == 0 {
            return Err(ApiError::NoEntitlement);
        }

        let url = self.signer.sign(&version.storage_key);

        self.audit
            .record(
                &account_id.to_string(),
                "download.issued",
                "product",
                &product_id.to_string(),
                serde_json::json!({
                    "token_id": token.id.to_string(),
                    "version": version.version,
                }),
            )
            .await;

        info!(
            %account_id,
            %product_id,
            version = %version.version,
            "download URL issued"
        );

        Ok(IssuedDownload {
            url,
            version: version.version,
            expires_in_secs: self.signer.ttl_secs(),
        })
    }
}
