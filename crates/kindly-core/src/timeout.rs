// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time bound for external calls.

use std::future::Future;
use std::time::Duration;

use crate::error::KindlyError;

/// Runs `fut` to completion or fails with [`KindlyError::Timeout`] after `duration`.
pub async fn bounded<T, F>(duration: Duration, fut: F) -> Result<T, KindlyError>
where
    F: Future<Output = Result<T, KindlyError>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(KindlyError::Timeout { duration }),
    }
}
