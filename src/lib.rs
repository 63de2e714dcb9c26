pub mod archive;
pub mod attachments;
pub mod browser;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod model;

//  Re-export commonly used items
pub use archive::{ArchiveWriter, FileArchive};
pub use attachments::{AttachmentResolver, FilenameAllocator, HttpResolver};
pub use browser::{BrowserLauncher, ChromeDriver, ChromeLauncher, PageDriver};
pub use config::{CaptureConfig, Timings};
pub use engine::{
    CaptureEngine, CaptureEvent, CaptureEvents, CaptureState, CaptureSummary, Collaborators,
    EngineSettings, LogEvents, Progress, StopHandle,
};
pub use error::{CaptureError, Result};
pub use extract::{ChatLayout, DomExtractor, FallbackIdPolicy, PageExtractor};
pub use ledger::Ledger;
pub use model::{Attachment, Message, OutputFormat, ScrollState, Session};
