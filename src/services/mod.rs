//! Credential issuance core, the storage control plane, and the record store.

pub mod container_ensurer;
pub mod credential_minter;
pub mod object_namer;
pub mod review_repository;
pub mod signer;
pub mod storage_service;
pub mod upload_issuer;
pub mod url_rewriter;
