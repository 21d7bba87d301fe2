//! Core data types for the Zenodo API
//!
//! Response bodies are deserialized straight into these types; a body that
//! does not fit is reported as [`crate::Error::SchemaValidation`]. Every
//! object keeps unknown fields in an `extra` map so newer API additions
//! survive a round trip.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier that the API sends either as a number or as a string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Number(u64),
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Number(n) => write!(f, "{}", n),
            Identifier::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for Identifier {
    fn from(value: u64) -> Self {
        Identifier::Number(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::Text(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::Text(value)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Kind of upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    Publication,
    Poster,
    Presentation,
    Dataset,
    Image,
    Video,
    Software,
    Lesson,
    #[serde(rename = "physicalobject")]
    PhysicalObject,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRight {
    Open,
    Embargoed,
    Restricted,
    Closed,
}

/// Person credited on an upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gnd: Option<String>,
}

impl Creator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    #[serde(rename = "type")]
    pub contributor_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gnd: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedIdentifier {
    pub identifier: String,
    pub relation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub term: String,
    pub identifier: String,
    pub scheme: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    pub place: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(rename = "type")]
    pub interval_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Descriptive metadata of a deposition or record
///
/// Only the commonly used fields are typed; everything else lands in
/// `extra` and is sent back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_type: Option<UploadType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
    /// ISO 8601 date (`YYYY-MM-DD`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creators: Vec<Creator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_right: Option<AccessRight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embargo_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_conditions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prereserve_doi: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_identifiers: Vec<RelatedIdentifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<Contributor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub communities: Vec<Community>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<Grant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dates: Vec<DateInterval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub fn new(upload_type: UploadType, title: impl Into<String>) -> Self {
        Self {
            upload_type: Some(upload_type),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_creator(mut self, creator: Creator) -> Self {
        self.creators.push(creator);
        self
    }

    pub fn with_access_right(mut self, access_right: AccessRight) -> Self {
        self.access_right = Some(access_right);
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    pub fn with_publication_date(mut self, date: impl Into<String>) -> Self {
        self.publication_date = Some(date.into());
        self
    }
}

/// `{"metadata": ...}` envelope used by create and update calls
#[derive(Debug, Serialize)]
pub(crate) struct MetadataEnvelope<'a> {
    pub metadata: &'a Metadata,
}

// ============================================================================
// Depositions and records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositionState {
    #[serde(rename = "inprogress")]
    InProgress,
    Done,
    Error,
    Unsubmitted,
}

/// Deposition resource (legacy deposit API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositionValue {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    /// Present only once published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi_url: Option<String>,
    #[serde(default)]
    pub files: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DepositionState>,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conceptrecid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conceptdoi: Option<String>,
    #[serde(default)]
    pub links: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Identifier,
}

/// Record resource (records API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordValue {
    pub id: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recid: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DepositionState>,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub links: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Files
// ============================================================================

/// File attached to a deposition or a record
///
/// The deposit API describes files by `id`/`filename`/`filesize`, the
/// records API by `key`/`size`; both shapes deserialize into this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZenodoFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// MD5, prefixed with `md5:` on the records API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub links: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ZenodoFile {
    /// File name under either API
    pub fn name(&self) -> Option<&str> {
        self.key.as_deref().or(self.filename.as_deref())
    }

    /// Link serving the file content
    pub fn download_link(&self) -> Option<&str> {
        self.links
            .get("download")
            .or_else(|| self.links.get("content"))
            .map(String::as_str)
    }
}

/// Page of draft files returned by the records API
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct FileEntries {
    #[serde(default)]
    pub entries: Vec<ZenodoFile>,
    #[serde(default)]
    pub links: PageLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PageLinks {
    #[serde(default)]
    pub next: Option<String>,
}

/// Key registration body for the first step of a records upload
#[derive(Debug, Serialize)]
pub(crate) struct FileKey<'a> {
    pub key: &'a str,
}

/// Outcome of one file in a batch upload
#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    Fulfilled { filename: String, file: ZenodoFile },
    Rejected { filename: String, error: String },
}

impl UploadStatus {
    pub fn filename(&self) -> &str {
        match self {
            UploadStatus::Fulfilled { filename, .. } | UploadStatus::Rejected { filename, .. } => {
                filename
            }
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, UploadStatus::Fulfilled { .. })
    }
}

// ============================================================================
// Reviews (community requests)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewActions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<ReviewActions>,
    #[serde(default, rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewTopic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Identifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewReceiver {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<Identifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCreator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identifier>,
}

/// Review request (the API calls it a "request")
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<ReviewLinks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<u64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub review_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_closed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expired: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ReviewCreator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<ReviewReceiver>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<ReviewTopic>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Review {
    /// Whether this review concerns the record with `record_id`
    pub fn is_for_record(&self, record_id: &Identifier) -> bool {
        self.topic
            .as_ref()
            .and_then(|topic| topic.record.as_ref())
            .is_some_and(|record| record.to_string() == record_id.to_string())
    }

    pub fn submit_link(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|links| links.actions.as_ref())
            .and_then(|actions| actions.submit.as_deref())
    }
}

/// Body of a community submission
#[derive(Debug, Serialize)]
pub(crate) struct CommunitySubmission<'a> {
    pub receiver: ReviewReceiverRef<'a>,
    #[serde(rename = "type")]
    pub submission_type: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewReceiverRef<'a> {
    pub community: &'a str,
}

// ============================================================================
// Search results and list options
// ============================================================================

/// `{"hits": {"hits": [...], "total": n}}` envelope of search endpoints
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResults<T> {
    pub hits: Hits<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Hits<T> {
    #[serde(default = "Vec::new")]
    pub hits: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Draft,
    Published,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::Draft => "draft",
            StatusFilter::Published => "published",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "bestmatch")]
    BestMatch,
    #[serde(rename = "mostrecent")]
    MostRecent,
    #[serde(rename = "-bestmatch")]
    BestMatchDescending,
    #[serde(rename = "-mostrecent")]
    MostRecentDescending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::BestMatch => "bestmatch",
            SortOrder::MostRecent => "mostrecent",
            SortOrder::BestMatchDescending => "-bestmatch",
            SortOrder::MostRecentDescending => "-mostrecent",
        }
    }
}

/// Search options shared by the deposition and record listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Elasticsearch query string; `/` (present in DOIs) has special meaning
    pub q: Option<String>,
    pub status: Option<StatusFilter>,
    pub sort: Option<SortOrder>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    /// Show all versions instead of the latest only
    pub all_versions: Option<bool>,
}

pub type ListDepositionsOptions = ListOptions;
pub type ListRecordsOptions = ListOptions;

impl ListOptions {
    pub fn query(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn status(mut self, status: StatusFilter) -> Self {
        self.status = Some(status);
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn all_versions(mut self, all_versions: bool) -> Self {
        self.all_versions = Some(all_versions);
        self
    }

    /// Query parameters in a stable order, unset options omitted
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(q) = &self.q {
            params.push(("q".to_string(), q.clone()));
        }
        if let Some(status) = self.status {
            params.push(("status".to_string(), status.as_str().to_string()));
        }
        if let Some(sort) = self.sort {
            params.push(("sort".to_string(), sort.as_str().to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.size {
            params.push(("size".to_string(), size.to_string()));
        }
        if let Some(all_versions) = self.all_versions {
            params.push(("all_versions".to_string(), all_versions.to_string()));
        }
        params
    }
}
