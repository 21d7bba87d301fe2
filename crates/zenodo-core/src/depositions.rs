//! Depositions on the legacy deposit API
//!
//! Collection calls live on [`Zenodo`]; calls scoped to one deposition live
//! on the [`Deposition`] handle returned by them.

use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;

use crate::files::FileBlob;
use crate::http::builder::RequestSpec;
use crate::types::{
    DepositionValue, ListDepositionsOptions, Metadata, MetadataEnvelope, UploadStatus, ZenodoFile,
};
use crate::zenodo::Zenodo;
use crate::Result;

const DEPOSITIONS_ROUTE: &str = "deposit/depositions";

/// Waits before each round of [`Deposition::create_files`]
pub const DEFAULT_UPLOAD_DELAYS_MS: [u64; 6] = [0, 1000, 2000, 4000, 8000, 16000];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFilesOptions {
    /// One upload round per entry, each preceded by the given wait
    pub delays: Vec<Duration>,
}

impl Default for CreateFilesOptions {
    fn default() -> Self {
        Self {
            delays: DEFAULT_UPLOAD_DELAYS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        }
    }
}

impl CreateFilesOptions {
    pub fn with_delays(delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            delays: delays.into_iter().collect(),
        }
    }
}

impl Zenodo {
    pub async fn list_depositions(&self, options: &ListDepositionsOptions) -> Result<Vec<Deposition>> {
        let mut spec = RequestSpec::get(DEPOSITIONS_ROUTE);
        for (key, value) in options.to_query() {
            spec = spec.query(key, value);
        }
        let values: Vec<DepositionValue> = self.request(spec).await?.json().await?;
        self.log_info(&format!("Listed {} depositions", values.len()));
        Ok(values
            .into_iter()
            .map(|value| Deposition::new(self.clone(), value))
            .collect())
    }

    pub async fn create_deposition(&self, metadata: &Metadata) -> Result<Deposition> {
        let spec = RequestSpec::post(DEPOSITIONS_ROUTE)
            .json_body(&MetadataEnvelope { metadata })?
            .expect_status(201);
        let value: DepositionValue = self.request(spec).await?.json().await?;
        self.log_info(&format!("Created deposition {}", value.id));
        Ok(Deposition::new(self.clone(), value))
    }

    pub async fn retrieve_deposition(&self, id: u64) -> Result<Deposition> {
        let spec = RequestSpec::get(format!("{}/{}", DEPOSITIONS_ROUTE, id));
        let value: DepositionValue = self.request(spec).await?.json().await?;
        self.log_info(&format!("Retrieved deposition {}", id));
        Ok(Deposition::new(self.clone(), value))
    }

    pub async fn delete_deposition(&self, id: u64) -> Result<()> {
        let spec = RequestSpec::delete(format!("{}/{}", DEPOSITIONS_ROUTE, id)).expect_status(204);
        self.request(spec).await?;
        self.log_info(&format!("Deleted deposition {}", id));
        Ok(())
    }
}

#[derive(Serialize)]
struct FileId<'a> {
    id: &'a str,
}

/// A deposition bound to the client that fetched it
#[derive(Debug, Clone)]
pub struct Deposition {
    zenodo: Zenodo,
    pub value: DepositionValue,
}

impl Deposition {
    pub fn new(zenodo: Zenodo, value: DepositionValue) -> Self {
        Self { zenodo, value }
    }

    pub fn id(&self) -> u64 {
        self.value.id
    }

    fn route(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/{}", DEPOSITIONS_ROUTE, self.value.id)
        } else {
            format!("{}/{}/{}", DEPOSITIONS_ROUTE, self.value.id, suffix)
        }
    }

    /// Upload one file as a multipart form
    pub async fn create_file(&self, file: &FileBlob) -> Result<ZenodoFile> {
        let spec = RequestSpec::post(self.route("files"))
            .body(file.to_multipart())
            .expect_status(201);
        let created: ZenodoFile = self.zenodo.request(spec).await?.json().await?;
        self.zenodo.log_info(&format!(
            "Created file {} for deposition {}",
            created.id.as_deref().unwrap_or("<unknown>"),
            self.value.id
        ));
        Ok(created)
    }

    /// Upload several files concurrently
    ///
    /// Each round waits for its delay, then uploads every file still
    /// rejected. Returns one status per input file, in input order.
    pub async fn create_files(
        &self,
        files: &[FileBlob],
        options: &CreateFilesOptions,
    ) -> Result<Vec<UploadStatus>> {
        let mut outcomes: Vec<Option<std::result::Result<ZenodoFile, String>>> =
            vec![None; files.len()];
        let mut remaining: Vec<usize> = (0..files.len()).collect();

        for wait in &options.delays {
            if remaining.is_empty() {
                break;
            }
            tokio::time::sleep(*wait).await;

            let results = join_all(remaining.iter().map(|&i| self.create_file(&files[i]))).await;

            let mut rejected = Vec::new();
            for (index, result) in remaining.into_iter().zip(results) {
                match result {
                    Ok(file) => outcomes[index] = Some(Ok(file)),
                    Err(e) => {
                        outcomes[index] = Some(Err(e.to_string()));
                        rejected.push(index);
                    }
                }
            }
            remaining = rejected;
        }

        if remaining.is_empty() {
            self.zenodo.log_info(&format!(
                "Successfully uploaded all files for deposition {}",
                self.value.id
            ));
        } else {
            let names: Vec<&str> = remaining.iter().map(|&i| files[i].name.as_str()).collect();
            self.zenodo.log_warn(&format!(
                "Failed to upload {} files after {} attempts: {}",
                remaining.len(),
                options.delays.len(),
                names.join(", ")
            ));
        }

        Ok(files
            .iter()
            .zip(outcomes)
            .map(|(blob, outcome)| match outcome {
                Some(Ok(file)) => UploadStatus::Fulfilled {
                    filename: file.name().unwrap_or(&blob.name).to_string(),
                    file,
                },
                Some(Err(error)) => UploadStatus::Rejected {
                    filename: blob.name.clone(),
                    error,
                },
                None => UploadStatus::Rejected {
                    filename: blob.name.clone(),
                    error: "no upload attempt was made".to_string(),
                },
            })
            .collect())
    }

    pub async fn list_files(&self) -> Result<Vec<ZenodoFile>> {
        let spec = RequestSpec::get(self.route("files"));
        let files: Vec<ZenodoFile> = self.zenodo.request(spec).await?.json().await?;
        self.zenodo.log_info(&format!(
            "Listed {} files for deposition {}",
            files.len(),
            self.value.id
        ));
        Ok(files)
    }

    /// `id` is the file id or its name
    pub async fn retrieve_file(&self, id: &str) -> Result<ZenodoFile> {
        let spec = RequestSpec::get(self.route(&format!("files/{}", id)));
        let file: ZenodoFile = self.zenodo.request(spec).await?.json().await?;
        self.zenodo.log_info(&format!(
            "Retrieved file {} for deposition {}",
            id, self.value.id
        ));
        Ok(file)
    }

    pub async fn delete_file(&self, id: &str) -> Result<()> {
        let spec = RequestSpec::delete(self.route(&format!("files/{}", id))).expect_status(204);
        self.zenodo.request(spec).await?;
        self.zenodo.log_info(&format!(
            "Deleted file {} for deposition {}",
            id, self.value.id
        ));
        Ok(())
    }

    /// Reorder files; the first id becomes the preview file
    pub async fn sort_files(&self, ids: &[&str]) -> Result<Vec<ZenodoFile>> {
        let body: Vec<FileId<'_>> = ids.iter().map(|&id| FileId { id }).collect();
        let spec = RequestSpec::put(self.route("files")).json_body(&body)?;
        let files: Vec<ZenodoFile> = self.zenodo.request(spec).await?.json().await?;
        self.zenodo.log_info(&format!(
            "Sorted {} files for deposition {}",
            files.len(),
            self.value.id
        ));
        Ok(files)
    }

    /// Replace the metadata; returns the deposition as the server now has it
    pub async fn update(&self, metadata: &Metadata) -> Result<Deposition> {
        let spec = RequestSpec::put(self.route("")).json_body(&MetadataEnvelope { metadata })?;
        let value: DepositionValue = self.zenodo.request(spec).await?.json().await?;
        self.zenodo
            .log_info(&format!("Updated deposition {}", self.value.id));
        Ok(Deposition::new(self.zenodo.clone(), value))
    }

    pub async fn publish(&self) -> Result<Deposition> {
        let spec = RequestSpec::post(self.route("actions/publish")).expect_status(202);
        let value: DepositionValue = self.zenodo.request(spec).await?.json().await?;
        self.zenodo
            .log_info(&format!("Published deposition {}", self.value.id));
        Ok(Deposition::new(self.zenodo.clone(), value))
    }

    /// Open a new version draft
    ///
    /// A draft whose metadata lacks a publication date gets today's date.
    pub async fn new_version(&self) -> Result<Deposition> {
        let spec = RequestSpec::post(self.route("actions/newversion")).expect_status(201);
        let value: DepositionValue = self.zenodo.request(spec).await?.json().await?;
        let mut deposition = Deposition::new(self.zenodo.clone(), value);

        let undated = deposition
            .value
            .metadata
            .as_ref()
            .filter(|metadata| metadata.publication_date.is_none())
            .cloned();
        if let Some(mut metadata) = undated {
            metadata.publication_date = Some(chrono::Utc::now().format("%Y-%m-%d").to_string());
            deposition = deposition.update(&metadata).await?;
        }

        self.zenodo.log_info(&format!(
            "Created new version for deposition {}",
            self.value.id
        ));
        Ok(deposition)
    }
}
