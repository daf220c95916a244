// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The error taxonomy shared by every component of the adaptation layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A specialized `Result` type for resource-layer operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// The machine-checkable category of a [`ResourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The request was malformed and rejected without side effects.
    InvalidArgument,
    /// Admission control could not satisfy the request.
    InsufficientResources,
    /// The referenced allocation, reservation or task does not exist.
    NotFound,
    /// The configured execution mode needs a device that is not present.
    DeviceUnavailable,
    /// A task aged out or a reservation expired.
    Timeout,
    /// Internal bookkeeping became inconsistent.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An error raised by the monitor, adjuster, allocation manager or balancer.
///
/// Every variant carries a human-readable message; [`ResourceError::kind`]
/// exposes the category for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ResourceError {
    /// A request or configuration value was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Not enough headroom to grant the request.
    #[error("insufficient resources: {0}")]
    InsufficientResources(String),
    /// An unknown id was looked up.
    #[error("not found: {0}")]
    NotFound(String),
    /// Hardware execution was requested without a detected accelerator.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    /// A deadline, TTL or task age limit elapsed.
    #[error("timeout: {0}")]
    Timeout(String),
    /// Allocation bookkeeping is inconsistent.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResourceError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResourceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ResourceError::InsufficientResources(_) => ErrorKind::InsufficientResources,
            ResourceError::NotFound(_) => ErrorKind::NotFound,
            ResourceError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            ResourceError::Timeout(_) => ErrorKind::Timeout,
            ResourceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the human-readable message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            ResourceError::InvalidArgument(msg)
            | ResourceError::InsufficientResources(msg)
            | ResourceError::NotFound(msg)
            | ResourceError::DeviceUnavailable(msg)
            | ResourceError::Timeout(msg)
            | ResourceError::Internal(msg) => msg,
        }
    }

    /// Whether the caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResourceError::InsufficientResources(_) | ResourceError::Timeout(_)
        )
    }

    /// Shorthand for an [`ResourceError::InvalidArgument`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        ResourceError::InvalidArgument(msg.into())
    }

    /// Shorthand for an [`ResourceError::InsufficientResources`].
    pub fn insufficient(msg: impl Into<String>) -> Self {
        ResourceError::InsufficientResources(msg.into())
    }

    /// Shorthand for a [`ResourceError::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        ResourceError::NotFound(msg.into())
    }
}
