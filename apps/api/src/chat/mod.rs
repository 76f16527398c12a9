// Query side: retrieval over the current resume and the running conversation.

pub mod handlers;
pub mod query;
