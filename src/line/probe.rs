// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reachability check run before a line is configured.

use std::sync::Arc;

use crate::client::{ClientFactory, DeviceClient};
use crate::error::ProbeError;
use crate::types::DeviceAddress;

/// Opens a client, runs one update and closes it again.
///
/// Use this to validate a host and address before creating a
/// [`Line`](super::Line). The probe makes a single attempt and takes no
/// gate, so it must not run against a line that is already polled.
///
/// # Errors
///
/// - `ProbeError::CannotConnect` if the connection or the update failed,
///   or the update returned no data
/// - `ProbeError::Unknown` if the blocking worker failed
pub async fn probe<F: ClientFactory>(
    factory: Arc<F>,
    host: &str,
    address: DeviceAddress,
) -> Result<(), ProbeError> {
    let host = host.to_string();

    let result = tokio::task::spawn_blocking(move || {
        let mut client = factory
            .connect(&host, address)
            .map_err(|err| ProbeError::CannotConnect {
                address,
                source: Some(err),
            })?;

        let updated = client.update();
        if let Err(err) = client.close() {
            tracing::debug!(%address, error = %err, "Ignoring close failure after probe");
        }

        match updated {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProbeError::CannotConnect {
                address,
                source: None,
            }),
            Err(err) => Err(ProbeError::CannotConnect {
                address,
                source: Some(err),
            }),
        }
    })
    .await
    .map_err(|err| ProbeError::Unknown(err.to_string()))?;

    match &result {
        Ok(()) => tracing::debug!(%address, "Probe succeeded"),
        Err(err) => tracing::warn!(%address, error = %err, "Probe failed"),
    }
    result
}
