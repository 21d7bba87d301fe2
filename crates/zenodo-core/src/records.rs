//! Records on the newer records API
//!
//! Records go through a draft: files are registered, uploaded and committed
//! on the draft, which is then published or handed to a community review.

use futures::future::try_join_all;
use serde_json::Value;

use crate::archive::zip_files;
use crate::files::FileBlob;
use crate::http::builder::{RequestSpec, OCTET_STREAM_CONTENT_TYPE};
use crate::types::{
    CommunitySubmission, FileEntries, FileKey, Identifier, ListRecordsOptions, Metadata,
    MetadataEnvelope, RecordValue, Review, ReviewReceiverRef, SearchResults, ZenodoFile,
};
use crate::zenodo::Zenodo;
use crate::{Error, Result};

const RECORDS_ROUTE: &str = "records";
const USER_RECORDS_ROUTE: &str = "user/records";
const REQUESTS_ROUTE: &str = "requests";
const COMMUNITY_SUBMISSION: &str = "community-submission";

impl Zenodo {
    /// Records owned by the authenticated user
    pub async fn list_records(&self, options: &ListRecordsOptions) -> Result<Vec<Record>> {
        let mut spec = RequestSpec::get(USER_RECORDS_ROUTE);
        for (key, value) in options.to_query() {
            spec = spec.query(key, value);
        }
        let results: SearchResults<RecordValue> = self.request(spec).await?.json().await?;
        let records: Vec<Record> = results
            .hits
            .hits
            .into_iter()
            .map(|value| Record::new(self.clone(), value))
            .collect();
        self.log_info(&format!("Listed {} records", records.len()));
        Ok(records)
    }

    /// Create a new draft record
    pub async fn create_record(&self, metadata: &Metadata) -> Result<Record> {
        let spec = RequestSpec::post(RECORDS_ROUTE)
            .json_body(&MetadataEnvelope { metadata })?
            .expect_status(201);
        let value: RecordValue = self.request(spec).await?.json().await?;
        self.log_info(&format!("Created record {}", value.id));
        Ok(Record::new(self.clone(), value))
    }

    /// Fetch the draft of a record
    pub async fn retrieve_record(&self, id: impl Into<Identifier>) -> Result<Record> {
        let id = id.into();
        let spec = RequestSpec::get(format!("{}/{}/draft", RECORDS_ROUTE, id));
        let value: RecordValue = self.request(spec).await?.json().await?;
        self.log_info(&format!("Retrieved record {}", id));
        Ok(Record::new(self.clone(), value))
    }

    /// Discard the draft of a record
    pub async fn delete_record(&self, id: impl Into<Identifier>) -> Result<()> {
        let id = id.into();
        let spec = RequestSpec::delete(format!("{}/{}/draft", RECORDS_ROUTE, id)).expect_status(204);
        self.request(spec).await?;
        self.log_info(&format!("Deleted record {}", id));
        Ok(())
    }

    /// Every version of a record, as returned by the API
    pub async fn retrieve_versions(&self, id: impl Into<Identifier>) -> Result<Vec<Value>> {
        let id = id.into();
        let spec = RequestSpec::get(format!("{}/{}/versions", RECORDS_ROUTE, id));
        let results: SearchResults<Value> = self.request(spec).await?.json().await?;
        self.log_info(&format!(
            "Retrieved {} versions for record {}",
            results.hits.hits.len(),
            id
        ));
        Ok(results.hits.hits)
    }

    /// Review requests visible to the authenticated user
    pub async fn retrieve_requests(&self) -> Result<Vec<Review>> {
        let results: SearchResults<Review> = self
            .request(RequestSpec::get(REQUESTS_ROUTE))
            .await?
            .json()
            .await?;
        self.log_info(&format!("Retrieved {} requests", results.hits.hits.len()));
        Ok(results.hits.hits)
    }
}

/// A record bound to the client that fetched it
#[derive(Debug, Clone)]
pub struct Record {
    zenodo: Zenodo,
    pub value: RecordValue,
}

impl Record {
    pub fn new(zenodo: Zenodo, value: RecordValue) -> Self {
        Self { zenodo, value }
    }

    pub fn id(&self) -> &Identifier {
        &self.value.id
    }

    fn route(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/{}", RECORDS_ROUTE, self.value.id)
        } else {
            format!("{}/{}/{}", RECORDS_ROUTE, self.value.id, suffix)
        }
    }

    /// Upload files to the draft
    ///
    /// Registers every key first, then uploads and commits each file
    /// concurrently. Returns the committed files in input order.
    pub async fn upload_files(&self, files: &[FileBlob]) -> Result<Vec<ZenodoFile>> {
        let keys: Vec<FileKey<'_>> = files
            .iter()
            .map(|file| FileKey { key: &file.name })
            .collect();
        let register = RequestSpec::post(self.route("draft/files"))
            .json_body(&keys)?
            .expect_status(201);
        self.zenodo.request(register).await?;

        let committed = try_join_all(files.iter().map(|file| self.upload_content(file))).await?;
        self.zenodo.log_info(&format!(
            "Uploaded {} files for record {}",
            committed.len(),
            self.value.id
        ));
        Ok(committed)
    }

    async fn upload_content(&self, file: &FileBlob) -> Result<ZenodoFile> {
        let content = RequestSpec::put(self.route(&format!("draft/files/{}/content", file.name)))
            .body(file.data.clone())
            .content_type(OCTET_STREAM_CONTENT_TYPE);
        self.zenodo.request(content).await?;

        let commit = RequestSpec::post(self.route(&format!("draft/files/{}/commit", file.name)));
        self.zenodo.request(commit).await?.json().await
    }

    /// Zip `files` into `{name}.zip` and upload the archive
    pub async fn upload_files_as_zip(&self, files: &[FileBlob], name: &str) -> Result<Vec<ZenodoFile>> {
        let archive = zip_files(files, name)?;
        self.upload_files(std::slice::from_ref(&archive)).await
    }

    /// First page of draft files
    pub async fn list_files(&self) -> Result<Vec<ZenodoFile>> {
        let spec = RequestSpec::get(self.route("draft/files"));
        let page: FileEntries = self.zenodo.request(spec).await?.json().await?;

        if page.entries.is_empty() {
            self.zenodo
                .log_info(&format!("No files found for record {}", self.value.id));
            return Ok(Vec::new());
        }
        if page.links.next.is_some() {
            self.zenodo.log_warn(&format!(
                "Multiple pages of files found for record {}. Only the first page is returned.",
                self.value.id
            ));
        }
        self.zenodo.log_info(&format!(
            "Listed {} files for record {}",
            page.entries.len(),
            self.value.id
        ));
        Ok(page.entries)
    }

    pub async fn retrieve_file(&self, filename: &str) -> Result<ZenodoFile> {
        let spec = RequestSpec::get(self.route(&format!("draft/files/{}", filename)));
        let file: ZenodoFile = self.zenodo.request(spec).await?.json().await?;
        self.zenodo.log_info(&format!(
            "Retrieved file {} for record {}",
            filename, self.value.id
        ));
        Ok(file)
    }

    pub async fn delete_file(&self, filename: &str) -> Result<()> {
        let spec =
            RequestSpec::delete(self.route(&format!("draft/files/{}", filename))).expect_status(204);
        self.zenodo.request(spec).await?;
        self.zenodo.log_info(&format!(
            "Deleted file {} for record {}",
            filename, self.value.id
        ));
        Ok(())
    }

    /// Delete every file on the first page, one at a time
    pub async fn delete_all_files(&self) -> Result<()> {
        for file in self.list_files().await? {
            if let Some(key) = file.name() {
                self.delete_file(key).await?;
            }
        }
        self.zenodo
            .log_info(&format!("Deleted all files for record {}", self.value.id));
        Ok(())
    }

    /// Replace the metadata of the draft, or of the published record
    pub async fn update(&self, metadata: &Metadata, is_published: bool) -> Result<Record> {
        let route = if is_published {
            self.route("")
        } else {
            self.route("draft")
        };
        let spec = RequestSpec::put(route).json_body(&MetadataEnvelope { metadata })?;
        let value: RecordValue = self.zenodo.request(spec).await?.json().await?;
        self.zenodo
            .log_info(&format!("Updated record {}", self.value.id));
        Ok(Record::new(self.zenodo.clone(), value))
    }

    pub async fn publish(&self) -> Result<Record> {
        let spec = RequestSpec::post(self.route("actions/publish")).expect_status(201);
        let value: RecordValue = self.zenodo.request(spec).await?.json().await?;
        self.zenodo
            .log_info(&format!("Published record {}", self.value.id));
        Ok(Record::new(self.zenodo.clone(), value))
    }

    pub async fn new_version(&self) -> Result<Record> {
        let spec = RequestSpec::post(self.route("actions/newversion")).expect_status(201);
        let value: RecordValue = self.zenodo.request(spec).await?.json().await?;
        self.zenodo
            .log_info(&format!("Created new version for record {}", self.value.id));
        Ok(Record::new(self.zenodo.clone(), value))
    }

    /// Submit the draft's pending review
    ///
    /// With a submit URL, it is posted directly. Without one, the pending
    /// request whose topic is this record is looked up and its submit
    /// action is used.
    pub async fn submit_for_review(&self, url: Option<&str>) -> Result<Review> {
        if let Some(url) = url {
            let route = requests_route(url);
            let review: Review = self
                .zenodo
                .request(RequestSpec::post(route.clone()))
                .await?
                .json()
                .await?;
            self.zenodo.log_info(&format!(
                "Submitted deposition {} for review via URL {}",
                self.value.id, route
            ));
            return Ok(review);
        }

        let review = self
            .zenodo
            .retrieve_requests()
            .await?
            .into_iter()
            .find(|review| review.is_for_record(&self.value.id))
            .ok_or_else(|| Error::SchemaValidation {
                message: format!("No review request found for record {}", self.value.id),
                source: None,
            })?;
        let submit = review
            .submit_link()
            .ok_or_else(|| Error::SchemaValidation {
                message: format!("Review request for record {} has no submit link", self.value.id),
                source: None,
            })?
            .to_string();

        self.zenodo
            .request(RequestSpec::post(submit).expect_status(202))
            .await?;
        self.zenodo.log_info(&format!(
            "Submitted deposition {} for review",
            self.value.id
        ));
        Ok(review)
    }

    /// Ask a community to include the draft
    pub async fn add_to_community(&self, community_id: &str) -> Result<Value> {
        let body = CommunitySubmission {
            receiver: ReviewReceiverRef {
                community: community_id,
            },
            submission_type: COMMUNITY_SUBMISSION,
        };
        let spec = RequestSpec::put(self.route("draft/review")).json_body(&body)?;
        let response: Value = self.zenodo.request(spec).await?.json().await?;
        self.zenodo.log_info(&format!(
            "Added deposition {} to community {}",
            self.value.id, community_id
        ));
        Ok(response)
    }

    pub async fn reserve_doi(&self) -> Result<Record> {
        let spec = RequestSpec::post(self.route("draft/pids/doi")).expect_status(201);
        let value: RecordValue = self.zenodo.request(spec).await?.json().await?;
        self.zenodo
            .log_info(&format!("Reserved DOI for record {}", self.value.id));
        Ok(Record::new(self.zenodo.clone(), value))
    }
}

/// Route of a review URL relative to the API root
///
/// Everything up to the last `requests/` is dropped.
fn requests_route(url: &str) -> String {
    match url.rfind("requests/") {
        Some(start) => url[start..].to_string(),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_route() {
        assert_eq!(
            requests_route("https://zenodo.org/api/requests/abc-123/actions/submit"),
            "requests/abc-123/actions/submit"
        );
        assert_eq!(requests_route("requests/abc"), "requests/abc");
        assert_eq!(requests_route("other/route"), "other/route");
    }

    #[test]
    fn test_community_submission_body() {
        let body = CommunitySubmission {
            receiver: ReviewReceiverRef { community: "c-1" },
            submission_type: COMMUNITY_SUBMISSION,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"receiver": {"community": "c-1"}, "type": "community-submission"})
        );
    }
}
