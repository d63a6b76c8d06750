//! Operator for BigQuery.
//!
//! Tasks describe their BigQuery work as a [`BigQueryOperation`], built from
//! the [`Provider`] of the evaluation context:
//!
//! ```rust
//! use std::sync::Arc;
//! use tsunagi::bigquery::{
//!     BigQueryClient, BigQueryConfig, BigQueryOperator, JobInfo, JobRequest, QueryRequest,
//!     QueryResult, SharedClient,
//! };
//! use tsunagi::named;
//!
//! struct Offline;
//!
//! impl BigQueryClient for Offline {
//!     fn query(&self, _: &QueryRequest) -> anyhow::Result<QueryResult> {
//!         Ok(QueryResult::default())
//!     }
//!
//!     fn job(&self, _: &JobRequest) -> anyhow::Result<JobInfo> {
//!         anyhow::bail!("offline")
//!     }
//! }
//!
//! let client = SharedClient::new(BigQueryConfig::new("my-project"), |_| {
//!     Ok(Arc::new(Offline) as Arc<dyn BigQueryClient>)
//! });
//!
//! let rows = named("CountRows", ("events",)).operator(
//!     BigQueryOperator::<u64>::new(client),
//!     |bq, ()| {
//!         Ok(bq
//!             .query(QueryRequest::new("SELECT COUNT(*) FROM events"))
//!             .success(|result| Ok(result.total_rows)))
//!     },
//! );
//! # let _ = rows;
//! ```
//!
//! The operator owns a [`SharedClient`]: the actual client is created by a
//! factory on the first `perform` and shared by every later call, from any
//! thread.

use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::context::EvalContext;
use crate::error::{DefinitionError, OperatorError};
use crate::operator::{Event, Listener, Operator};

/// The part of a BigQuery client the operator depends on.
pub trait BigQueryClient: Send + Sync {
    fn query(&self, request: &QueryRequest) -> anyhow::Result<QueryResult>;

    fn job(&self, request: &JobRequest) -> anyhow::Result<JobInfo>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigQueryConfig {
    pub project_id: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub default_dataset: Option<String>,
}

fn default_location() -> String {
    "US".into()
}

impl BigQueryConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: default_location(),
            default_dataset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub use_legacy_sql: bool,
    #[serde(default)]
    pub dry_run: bool,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            use_legacy_sql: false,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    #[default]
    WriteEmpty,
    WriteTruncate,
    WriteAppend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobConfiguration {
    #[serde(rename_all = "camelCase")]
    Query {
        query: String,
        destination: Option<TableId>,
        #[serde(default)]
        write_disposition: WriteDisposition,
    },
    #[serde(rename_all = "camelCase")]
    Copy {
        source: TableId,
        destination: TableId,
        #[serde(default)]
        write_disposition: WriteDisposition,
    },
    #[serde(rename_all = "camelCase")]
    Load {
        source_uris: Vec<String>,
        destination: TableId,
    },
    #[serde(rename_all = "camelCase")]
    Extract {
        source: TableId,
        destination_uris: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default)]
    pub job_id: Option<String>,
    pub configuration: JobConfiguration,
}

impl JobRequest {
    pub fn new(configuration: JobConfiguration) -> Self {
        Self {
            job_id: None,
            configuration,
        }
    }

    pub fn job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub job_id: Option<String>,
    pub schema: Vec<Field>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub total_rows: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub job_id: String,
    pub state: JobState,
    #[serde(default)]
    pub error: Option<String>,
}

/// The request kinds an operation can carry. Exactly one per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Query(QueryRequest),
    Job(JobRequest),
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Query(_) => "query",
            Request::Job(_) => "job",
        }
    }
}

/// A raw result, tagged with the request kind that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Query(QueryResult),
    Job(JobInfo),
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Query(_) => "query",
            Response::Job(_) => "job",
        }
    }
}

/// A request assembled from optional parts, as found in serialized
/// operation specs. Converting it into a [`Request`] checks that exactly one
/// kind is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDraft {
    #[serde(default)]
    pub query_request: Option<QueryRequest>,
    #[serde(default)]
    pub job_request: Option<JobRequest>,
}

impl TryFrom<RequestDraft> for Request {
    type Error = DefinitionError;

    fn try_from(draft: RequestDraft) -> Result<Self, Self::Error> {
        match (draft.query_request, draft.job_request) {
            (Some(query), None) => Ok(Request::Query(query)),
            (None, Some(job)) => Ok(Request::Job(job)),
            (None, None) => Err(DefinitionError::NoRequest),
            (Some(_), Some(_)) => Err(DefinitionError::ConflictingRequests("query, job".into())),
        }
    }
}

/// Raw result types a `success` transform can accept.
pub trait FromResponse: Sized {
    fn from_response(response: Response) -> Result<Self, DefinitionError>;
}

impl FromResponse for Response {
    fn from_response(response: Response) -> Result<Self, DefinitionError> {
        Ok(response)
    }
}

impl FromResponse for QueryResult {
    fn from_response(response: Response) -> Result<Self, DefinitionError> {
        match response {
            Response::Query(result) => Ok(result),
            other => Err(DefinitionError::ResponseMismatch {
                expected: "query",
                actual: other.kind(),
            }),
        }
    }
}

impl FromResponse for JobInfo {
    fn from_response(response: Response) -> Result<Self, DefinitionError> {
        match response {
            Response::Job(info) => Ok(info),
            other => Err(DefinitionError::ResponseMismatch {
                expected: "job",
                actual: other.kind(),
            }),
        }
    }
}

type Success<T> = Box<dyn FnOnce(Response) -> Result<T, OperatorError> + Send>;

/// One unit of BigQuery work: a request and the transform from its raw
/// result to the task output.
pub struct BigQueryOperation<T> {
    request: Request,
    success: Success<T>,
}

impl<T> BigQueryOperation<T> {
    pub fn request(&self) -> &Request {
        &self.request
    }
}

impl<T> std::fmt::Debug for BigQueryOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryOperation")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// An operation waiting for its `success` transform. `R` is the raw result
/// type the transform receives.
#[must_use]
pub struct Pending<R, T> {
    request: Request,
    _phantom: PhantomData<fn(R) -> T>,
}

impl<R, T> std::fmt::Debug for Pending<R, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("request", &self.request)
            .finish()
    }
}

impl<R, T> Pending<R, T>
where
    R: FromResponse + 'static,
    T: 'static,
{
    pub fn success<F>(self, transform: F) -> BigQueryOperation<T>
    where
        F: FnOnce(R) -> anyhow::Result<T> + Send + 'static,
    {
        BigQueryOperation {
            request: self.request,
            success: Box::new(move |response| {
                let raw = R::from_response(response)?;
                transform(raw).map_err(OperatorError::Transform)
            }),
        }
    }
}

/// Builds [`BigQueryOperation`]s. Created once per evaluation context.
pub struct Provider<T> {
    client: SharedClient,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> Provider<T> {
    pub fn config(&self) -> &BigQueryConfig {
        self.client.config()
    }

    /// A table in the configured project.
    pub fn table(&self, dataset: impl Into<String>, table: impl Into<String>) -> TableId {
        TableId {
            project: self.config().project_id.clone(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// A table in the configured default dataset, if there is one.
    pub fn default_table(&self, table: impl Into<String>) -> Option<TableId> {
        let dataset = self.config().default_dataset.clone()?;
        Some(self.table(dataset, table))
    }

    pub fn query(&self, request: QueryRequest) -> Pending<QueryResult, T> {
        self.request(Request::Query(request))
    }

    pub fn job(&self, request: JobRequest) -> Pending<JobInfo, T> {
        self.request(Request::Job(request))
    }

    pub fn request<R>(&self, request: Request) -> Pending<R, T> {
        Pending {
            request,
            _phantom: PhantomData,
        }
    }

    /// Same as [`Provider::request`], for requests read from a draft.
    pub fn draft(&self, draft: RequestDraft) -> Result<Pending<Response, T>, DefinitionError> {
        Ok(self.request(Request::try_from(draft)?))
    }
}

type ClientFactory =
    dyn Fn(&BigQueryConfig) -> anyhow::Result<Arc<dyn BigQueryClient>> + Send + Sync;

/// A lazily initialized client handle shared by clones.
///
/// The factory runs on the first [`SharedClient::get`]. Concurrent first
/// callers wait for that single initialization and share its result. If the
/// factory fails, the error goes to the caller that ran it and the next call
/// tries again.
#[derive(Clone)]
pub struct SharedClient {
    config: Arc<BigQueryConfig>,
    cell: Arc<OnceCell<Arc<dyn BigQueryClient>>>,
    factory: Arc<ClientFactory>,
}

impl SharedClient {
    pub fn new<F>(config: BigQueryConfig, factory: F) -> Self
    where
        F: Fn(&BigQueryConfig) -> anyhow::Result<Arc<dyn BigQueryClient>> + Send + Sync + 'static,
    {
        Self {
            config: Arc::new(config),
            cell: Arc::new(OnceCell::new()),
            factory: Arc::new(factory),
        }
    }

    pub fn config(&self) -> &BigQueryConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> anyhow::Result<Arc<dyn BigQueryClient>> {
        self.cell
            .get_or_try_init(|| {
                tracing::info!(project = %self.config.project_id, "initializing BigQuery client");
                (self.factory)(&self.config)
            })
            .cloned()
    }
}

impl std::fmt::Debug for SharedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedClient")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Performs [`BigQueryOperation`]s producing a `T`.
pub struct BigQueryOperator<T> {
    client: SharedClient,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> BigQueryOperator<T> {
    pub fn new(client: SharedClient) -> Self {
        Self {
            client,
            _phantom: PhantomData,
        }
    }

    fn dispatch(&self, request: Request, listener: &dyn Listener) -> Result<Response, OperatorError> {
        let client = self.client.get().map_err(OperatorError::ClientInit)?;

        listener.on_event(&Event::CallIssued {
            operation: request.kind(),
        });

        match request {
            Request::Query(request) => {
                let result = client.query(&request).map_err(OperatorError::External)?;
                if let Some(job_id) = &result.job_id {
                    listener.on_event(&Event::HandleObtained {
                        handle: job_id.clone(),
                    });
                }
                Ok(Response::Query(result))
            }
            Request::Job(request) => {
                let info = client.job(&request).map_err(OperatorError::External)?;
                listener.on_event(&Event::HandleObtained {
                    handle: info.job_id.clone(),
                });
                Ok(Response::Job(info))
            }
        }
    }
}

impl<T> Clone for BigQueryOperator<T> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<T> Operator for BigQueryOperator<T> {
    type Provider = Provider<T>;
    type Spec = BigQueryOperation<T>;
    type Output = T;

    fn provide(&self, _: &EvalContext) -> Self::Provider {
        Provider {
            client: self.client.clone(),
            _phantom: PhantomData,
        }
    }

    /// Operators on clones of the same [`SharedClient`] share a provider.
    /// The cached provider holds a clone, so the address stays unique.
    fn provider_key(&self) -> usize {
        Arc::as_ptr(&self.client.cell) as usize
    }

    fn perform(&self, spec: Self::Spec, listener: &dyn Listener) -> Result<T, OperatorError> {
        let BigQueryOperation { request, success } = spec;

        listener.on_event(&Event::Started {
            operation: request.kind(),
        });

        let result = self
            .dispatch(request, listener)
            .and_then(success);

        match &result {
            Ok(_) => listener.on_event(&Event::Completed),
            Err(e) => listener.on_event(&Event::Failed {
                reason: e.to_string(),
            }),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::NoopListener;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeClient {
        queries: AtomicUsize,
        jobs: AtomicUsize,
    }

    impl BigQueryClient for FakeClient {
        fn query(&self, request: &QueryRequest) -> anyhow::Result<QueryResult> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(QueryResult {
                job_id: Some("query_job_1".into()),
                schema: vec![Field {
                    name: "n".into(),
                    field_type: "INTEGER".into(),
                }],
                rows: vec![vec![serde_json::json!(request.query.len())]],
                total_rows: 1,
            })
        }

        fn job(&self, request: &JobRequest) -> anyhow::Result<JobInfo> {
            self.jobs.fetch_add(1, Ordering::SeqCst);
            Ok(JobInfo {
                job_id: request.job_id.clone().unwrap_or_else(|| "job_1".into()),
                state: JobState::Done,
                error: None,
            })
        }
    }

    fn operator<T>(client: Arc<FakeClient>) -> BigQueryOperator<T> {
        let shared = SharedClient::new(BigQueryConfig::new("test-project"), move |_| {
            Ok(client.clone() as Arc<dyn BigQueryClient>)
        });
        BigQueryOperator::new(shared)
    }

    fn copy_job() -> JobRequest {
        JobRequest::new(JobConfiguration::Copy {
            source: TableId {
                project: "p".into(),
                dataset: "d".into(),
                table: "a".into(),
            },
            destination: TableId {
                project: "p".into(),
                dataset: "d".into(),
                table: "b".into(),
            },
            write_disposition: WriteDisposition::WriteTruncate,
        })
        .job_id("copy_1")
    }

    #[test]
    fn test_job_path_only() {
        let client = Arc::new(FakeClient::default());
        let op = operator::<String>(client.clone());
        let provider = op.provide(&EvalContext::new());

        let spec = provider
            .job(copy_job())
            .success(|info| Ok(format!("{}:{:?}", info.job_id, info.state)));

        assert_eq!(op.perform(spec, &NoopListener).unwrap(), "copy_1:Done");
        assert_eq!(client.jobs.load(Ordering::SeqCst), 1);
        assert_eq!(client.queries.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_query_path_only() {
        let client = Arc::new(FakeClient::default());
        let op = operator::<u64>(client.clone());
        let provider = op.provide(&EvalContext::new());

        let spec = provider
            .query(QueryRequest::new("SELECT 1"))
            .success(|result| Ok(result.total_rows));

        assert_eq!(op.perform(spec, &NoopListener).unwrap(), 1);
        assert_eq!(client.queries.load(Ordering::SeqCst), 1);
        assert_eq!(client.jobs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_events() {
        let client = Arc::new(FakeClient::default());
        let op = operator::<String>(client);
        let provider = op.provide(&EvalContext::new());

        let seen = Mutex::new(Vec::new());
        let listener = |event: &Event| seen.lock().unwrap().push(event.clone());

        let spec = provider.job(copy_job()).success(|info| Ok(info.job_id));
        op.perform(spec, &listener).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Event::Started { operation: "job" },
                Event::CallIssued { operation: "job" },
                Event::HandleObtained {
                    handle: "copy_1".into()
                },
                Event::Completed,
            ]
        );
    }

    #[test]
    fn test_empty_draft_is_defect() {
        let op = operator::<u64>(Arc::new(FakeClient::default()));
        let provider = op.provide(&EvalContext::new());

        let err = provider.draft(RequestDraft::default()).unwrap_err();
        assert_eq!(err, DefinitionError::NoRequest);
        assert!(OperatorError::from(err).is_defect());
    }

    #[test]
    fn test_conflicting_draft_is_defect() {
        let draft = RequestDraft {
            query_request: Some(QueryRequest::new("SELECT 1")),
            job_request: Some(copy_job()),
        };

        assert!(matches!(
            Request::try_from(draft),
            Err(DefinitionError::ConflictingRequests(_))
        ));
    }

    #[test]
    fn test_draft_from_json() {
        let draft: RequestDraft = serde_json::from_str(
            r#"{"jobRequest": {"configuration": {"type": "extract", "source": {"project": "p", "dataset": "d", "table": "t"}, "destinationUris": ["gs://bucket/t-*.csv"]}}}"#,
        )
        .unwrap();

        let request = Request::try_from(draft).unwrap();
        assert_eq!(request.kind(), "job");
    }

    #[test]
    fn test_generic_response_transform() {
        let client = Arc::new(FakeClient::default());
        let op = operator::<&'static str>(client);
        let provider = op.provide(&EvalContext::new());

        let draft = RequestDraft {
            query_request: Some(QueryRequest::new("SELECT 1")),
            job_request: None,
        };

        let spec = provider.draft(draft).unwrap().success(|response| Ok(response.kind()));
        assert_eq!(op.perform(spec, &NoopListener).unwrap(), "query");
    }

    #[test]
    fn test_response_mismatch_is_defect() {
        let op = operator::<u64>(Arc::new(FakeClient::default()));
        let provider = op.provide(&EvalContext::new());

        let spec = provider
            .request::<JobInfo>(Request::Query(QueryRequest::new("SELECT 1")))
            .success(|_| Ok(0));

        let err = op.perform(spec, &NoopListener).unwrap_err();
        assert!(err.is_defect());
    }

    #[test]
    fn test_external_error_propagates() {
        struct Broken;

        impl BigQueryClient for Broken {
            fn query(&self, _: &QueryRequest) -> anyhow::Result<QueryResult> {
                anyhow::bail!("quota exceeded")
            }

            fn job(&self, _: &JobRequest) -> anyhow::Result<JobInfo> {
                anyhow::bail!("quota exceeded")
            }
        }

        let shared = SharedClient::new(BigQueryConfig::new("p"), |_| {
            Ok(Arc::new(Broken) as Arc<dyn BigQueryClient>)
        });
        let op = BigQueryOperator::<u64>::new(shared);
        let provider = op.provide(&EvalContext::new());

        let spec = provider
            .query(QueryRequest::new("SELECT 1"))
            .success(|result| Ok(result.total_rows));

        match op.perform(spec, &NoopListener) {
            Err(OperatorError::External(e)) => assert_eq!(e.to_string(), "quota exceeded"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_provide_does_not_initialize() {
        let op = operator::<u64>(Arc::new(FakeClient::default()));
        let provider = op.provide(&EvalContext::new());

        assert!(!op.client.is_initialized());
        assert_eq!(provider.table("d", "t").to_string(), "test-project.d.t");
        assert_eq!(provider.default_table("t"), None);
    }

    #[test]
    fn test_failed_init_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let shared = SharedClient::new(BigQueryConfig::new("p"), move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("no credentials");
            }
            Ok(Arc::new(FakeClient::default()) as Arc<dyn BigQueryClient>)
        });

        assert!(shared.get().is_err());
        assert!(!shared.is_initialized());
        assert!(shared.get().is_ok());
        assert!(shared.get().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_operators_on_different_clients_keep_their_config() {
        use crate::named;

        fn located(project: &'static str) -> crate::task::Task<String> {
            let shared = SharedClient::new(BigQueryConfig::new(project), |_| {
                Ok(Arc::new(FakeClient::default()) as Arc<dyn BigQueryClient>)
            });
            named("Locate", (project,)).operator(
                BigQueryOperator::<String>::new(shared),
                |bq, ()| {
                    let table = bq.table("d", "t").to_string();
                    Ok(bq
                        .query(QueryRequest::new("SELECT 1"))
                        .success(move |_| Ok(table)))
                },
            )
        }

        let root = named("Both", ())
            .input(|| located("proj-a"))
            .input(|| located("proj-b"))
            .process(|(a, b)| Ok(format!("{a} {b}")));

        let context = EvalContext::builder().listener(NoopListener).build();
        assert_eq!(context.evaluate(&root).unwrap(), "proj-a.d.t proj-b.d.t");
    }

    #[test]
    fn test_clones_share_provider_key() {
        let op = operator::<u64>(Arc::new(FakeClient::default()));
        let other = operator::<u64>(Arc::new(FakeClient::default()));

        assert_eq!(op.provider_key(), op.clone().provider_key());
        assert_ne!(op.provider_key(), other.provider_key());
    }

    #[test]
    fn test_config_defaults() {
        let config: BigQueryConfig =
            serde_json::from_str(r#"{"projectId": "p", "defaultDataset": "d"}"#).unwrap();

        assert_eq!(config.location, "US");
        assert_eq!(config.default_dataset.as_deref(), Some("d"));
    }
}
