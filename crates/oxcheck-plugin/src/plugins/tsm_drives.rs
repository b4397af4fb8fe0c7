//! Tape drives of a TSM (Spectrum Protect) server.
//!
//! ```text
//! <<<tsm_drives>>>
//! tsmfarm3   LIBRARY3   DRIVE01   LOADED   YES   000782XXXX
//! default    GPFSFILE   GPFSFILE1 UNKNOWN  YES
//! ```
//!
//! The section has no parse function; rows arrive as the raw table.

use crate::{into_results, CheckContext, CheckPlugin, CheckResults, SectionSet, Service};
use oxcheck_common::params::Parameters;
use oxcheck_common::types::{CheckOutput, Row, State};

const SECTION: &str = "tsm_drives";

pub struct TsmDrives;

fn drive_item(inst: &str, library: &str, drive: &str) -> String {
    let item = format!("{library} / {drive}");
    if inst == "default" {
        item
    } else {
        format!("{inst} / {item}")
    }
}

fn check_drive(row: &Row) -> CheckOutput {
    let (state, online) = (&row[3], &row[4]);
    let mut infotext = match row.get(5) {
        Some(serial) => format!("[{serial}] "),
        None => String::new(),
    };

    let mut monstate = State::Ok;
    infotext.push_str(&format!("state: {state}"));
    if state == "UNAVAILABLE" || state == "UNKNOWN" {
        monstate = State::Crit;
        infotext.push_str(State::Crit.marker());
    }

    infotext.push_str(&format!(", online: {online}"));
    if online != "YES" {
        monstate = State::Crit;
        infotext.push_str(State::Crit.marker());
    }

    CheckOutput::result(monstate, infotext)
}

impl CheckPlugin for TsmDrives {
    fn name(&self) -> &str {
        "tsm_drives"
    }

    fn service_name(&self) -> &str {
        "TSM Drive %s"
    }

    fn discover(&self, sections: &SectionSet) -> anyhow::Result<Vec<Service>> {
        let rows = sections.string_table(SECTION).unwrap_or_default();
        Ok(rows
            .iter()
            .filter(|row| row.len() == 6)
            .map(|row| Service::new(Some(&drive_item(&row[0], &row[1], &row[2]))))
            .collect())
    }

    fn check<'a>(
        &'a self,
        _ctx: &'a mut CheckContext<'_>,
        item: Option<&'a str>,
        _params: &'a Parameters,
        sections: &'a SectionSet,
    ) -> CheckResults<'a> {
        let rows = sections.string_table(SECTION).unwrap_or_default();
        let outputs = rows
            .iter()
            .filter(|row| row.len() >= 5)
            .find(|row| {
                let libdev = format!("{} / {}", row[1], row[2]);
                item == Some(libdev.as_str())
                    || item == Some(format!("{} / {libdev}", row[0]).as_str())
            })
            .map(check_drive)
            .into_iter()
            .collect();
        into_results(Ok(outputs))
    }
}
