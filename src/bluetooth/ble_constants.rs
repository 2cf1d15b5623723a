// Copyright 2026 Daniel Pelikan
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

//! BLE service and characteristic UUIDs for the SThexa controller.

use std::time::Duration;
use uuid::Uuid;

/// Transfer GATT service UUID.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0xa4f5c001_a42a_4340_91b0_c2c9034e45b9);

/// Transfer characteristic UUID.
/// Properties: Read, Write, Notify
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0xa4f5c002_a42a_4340_91b0_c2c9034e45b9);

/// Default advertised local name.
pub const DEFAULT_LOCAL_NAME: &str = "Daybreak-Hun";

/// Status shown while no robot is subscribed.
pub const NOT_CONNECTED_STATUS: &str = "The system is not connected yet!";

/// Status shown when service registration fails.
pub const REGISTRATION_FAILED_STATUS: &str = "Bluetooth service registration failed.";

/// Default notification period.
pub const NOTIFY_INTERVAL: Duration = Duration::from_millis(100);

/// Default attitude polling period.
pub const ATTITUDE_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            SERVICE_UUID.to_string().to_lowercase(),
            "a4f5c001-a42a-4340-91b0-c2c9034e45b9"
        );
        assert_eq!(
            CHARACTERISTIC_UUID.to_string().to_lowercase(),
            "a4f5c002-a42a-4340-91b0-c2c9034e45b9"
        );
    }
}
