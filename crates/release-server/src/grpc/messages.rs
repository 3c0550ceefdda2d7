//! Wire messages for the version RPC.
//!
//! Field numbers match `hapi/services/tiller.proto` and `hapi/version/version.proto`.

use common::version::BuildInfo;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetVersionRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetVersionResponse {
    #[prost(message, optional, tag = "1")]
    pub version: ::core::option::Option<Version>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Version {
    /// Semantic version, `v` prefixed.
    #[prost(string, tag = "1")]
    pub sem_ver: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub git_commit: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub git_tree_state: ::prost::alloc::string::String,
}

impl From<BuildInfo> for Version {
    fn from(info: BuildInfo) -> Self {
        Self {
            sem_ver: info.sem_ver,
            git_commit: info.git_commit,
            git_tree_state: info.git_tree_state,
        }
    }
}
