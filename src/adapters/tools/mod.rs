//! External tools invoked by the job.

pub mod script;

pub use script::ExternalScriptRefresher;
