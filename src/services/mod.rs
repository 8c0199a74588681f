//! Service layer for DeepDive.
//!
//! Contains business logic and external service integrations:
//! - AiClient (HTTP client for the AI microservice)
//! - ModelCache (TTL cache of enabled AI models)
//! - Assistant (chat proxy, summaries, insights, translation)
//! - Workspace (workspaces, AI tasks and status polling)
//! - Reports (report generation and storage)
//! - Export (document rendering)
//! - Templates (built-in report template catalogue)
//! - Notes, Collections, Comments, Resources

mod ai_client;
mod assistant;
mod collections;
mod comments;
pub mod export;
mod model_cache;
mod notes;
mod reports;
mod resources;
pub mod templates;
mod workspace;

pub use ai_client::{AiClient, AiReport, AiTaskResource, AiTaskStatus, CreateAiTask};
pub use assistant::{
    extract_json_array, AssistantService, ChatReply, ContentInput, SimpleChatInput, TranslateInput,
};
pub use collections::{
    AddItemInput, BatchDeleteInput, BatchMoveInput, BatchStatusInput, BatchTagsInput,
    CollectionService, CreateCollectionInput, ItemQuery, UpdateCollectionInput, UpdateItemInput,
};
pub use comments::{CommentService, CreateCommentInput, UpdateCommentInput};
pub use export::{BinaryRenderer, ExportFormat, ExportService, ExportedDocument, HttpDocumentRenderer};
pub use model_cache::ModelCache;
pub use notes::{
    CreateNoteInput, ExplainInput, GraphNodeInput, HighlightInput, NoteService, UpdateNoteInput,
};
pub use reports::{GenerateReportInput, ReportService};
pub use resources::{
    highlight_snippet, suggestion_score, BatchCreateInput, ResourceQuery, ResourceService,
    Suggestion,
};
pub use workspace::{
    next_poll_delay, resource_summary, serialize_task, CreateTaskInput, TaskEvent,
    WorkspaceService, MIN_WORKSPACE_RESOURCES,
};
