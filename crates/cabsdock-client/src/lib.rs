//! cabsdock-client - Drive the CABS-dock peptide docking web server.
//!
//! 1. Resolving receptor structure files (local cache or RCSB)
//! 2. Submitting docking jobs through the server's HTML form
//! 3. Polling job status pages until each job finishes
//! 4. Downloading result archives

pub mod csrf;
pub mod download;
pub mod joblist;
pub mod poller;
pub mod request;
pub mod status;
pub mod structure;
pub mod submit;

pub use cabsdock_common::{CabsError, Result, SandboxClient};
pub use poller::{PendingJobSet, PollOutcome, PollSettings, PollSummary, ResultPoller, Sleeper, TokioSleeper};
pub use request::{DockingJobRequest, JobHandle, ReceptorId};
pub use status::JobStatus;
pub use structure::StructureResolver;
pub use submit::{JobSubmitter, SessionContext, SubmissionOutcome, SubmitOptions};
