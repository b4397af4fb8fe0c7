//! Bundled check plugins.

pub mod mcafee_webgateway;
pub mod tsm_drives;
pub mod winperf_ts_sessions;

use crate::error::RegistryError;
use crate::registry::RegistryBuilder;

/// Registers every bundled section, check plugin and ruleset transform.
pub fn register_all(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder.register_section(Box::new(mcafee_webgateway::McafeeWebgatewaySection))?;

    builder.register_check(Box::new(tsm_drives::TsmDrives))?;
    builder.register_check(Box::new(winperf_ts_sessions::WinperfTsSessions))?;
    builder.register_check(Box::new(mcafee_webgateway::McafeeWebgateway))?;

    builder.register_transform(
        winperf_ts_sessions::RULESET,
        winperf_ts_sessions::transform_params,
    )?;
    Ok(())
}
