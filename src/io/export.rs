//! CSV export of microgrid step logs.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::engine::Microgrid;
use crate::sim::types::StepRecord;

/// Column header, one row per grid per tick.
const HEADER: &str = "grid,timestep,time_hr,load_kw,node_load_kw,renewable_kw,\
                      renewable_used_kw,curtailment_kw,battery_kw,battery_soc,\
                      battery_charge_kwh,grid_import_kw,grid_export_kw,loss_load_kw,\
                      cost,co2_kg,reward";

/// Exports the step log of every grid to a CSV file at `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_log_csv(grids: &[Microgrid], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_log_csv(grids, io::BufWriter::new(file))
}

/// Writes the step log of every grid as CSV to any writer.
///
/// Rows are grouped by grid in the order given, then by tick. Output is
/// deterministic for identical logs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_log_csv(grids: &[Microgrid], writer: impl Write) -> io::Result<()> {
    let logs = grids.iter().map(|g| (g.name(), g.log()));
    write_records(logs, writer)
}

/// Writes `(grid name, log)` pairs as CSV.
pub fn write_records<'a>(
    logs: impl IntoIterator<Item = (&'a str, &'a [StepRecord])>,
    writer: impl Write,
) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for (name, log) in logs {
        for r in log {
            wtr.write_record(&[
                name.to_string(),
                r.timestep.to_string(),
                format!("{:.2}", r.time_hr),
                format!("{:.4}", r.load_kw),
                format!("{:.4}", r.node_load_kw),
                format!("{:.4}", r.renewable_kw),
                format!("{:.4}", r.renewable_used_kw),
                format!("{:.4}", r.curtailment_kw),
                format!("{:.4}", r.battery_kw),
                format!("{:.4}", r.battery_soc),
                format!("{:.4}", r.battery_charge_kwh),
                format!("{:.4}", r.grid_import_kw),
                format!("{:.4}", r.grid_export_kw),
                format!("{:.4}", r.loss_load_kw),
                format!("{:.6}", r.cost),
                format!("{:.6}", r.co2_kg),
                format!("{:.6}", r.reward),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(t: usize) -> StepRecord {
        StepRecord {
            timestep: t,
            time_hr: t as f64 * 0.25,
            load_kw: 1.2,
            node_load_kw: 1.0,
            renewable_kw: 0.5,
            renewable_used_kw: 0.5,
            curtailment_kw: 0.0,
            battery_kw: -0.7,
            battery_soc: 0.48,
            battery_charge_kwh: 2.4,
            grid_import_kw: 0.0,
            grid_export_kw: 0.0,
            loss_load_kw: 0.0,
            cost: 0.0,
            co2_kg: 0.0,
            reward: 0.0,
        }
    }

    fn render(logs: &[(&str, Vec<StepRecord>)]) -> String {
        let mut buf = Vec::new();
        write_records(logs.iter().map(|(n, l)| (*n, l.as_slice())), &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn header_is_fixed() {
        let out = render(&[]);
        assert_eq!(
            out.lines().next(),
            Some(
                "grid,timestep,time_hr,load_kw,node_load_kw,renewable_kw,\
                 renewable_used_kw,curtailment_kw,battery_kw,battery_soc,\
                 battery_charge_kwh,grid_import_kw,grid_export_kw,loss_load_kw,\
                 cost,co2_kg,reward"
            )
        );
    }

    #[test]
    fn one_row_per_grid_per_step() {
        let a: Vec<_> = (0..4).map(record).collect();
        let b: Vec<_> = (0..4).map(record).collect();
        let out = render(&[("ES10", a), ("PT02", b)]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 9);
        assert!(lines[1].starts_with("ES10,0,0.00,"));
        assert!(lines[5].starts_with("PT02,0,"));
    }

    #[test]
    fn rows_parse_back_as_numbers() {
        let out = render(&[("ES10", (0..3).map(record).collect())]);
        let mut rdr = csv::Reader::from_reader(out.as_bytes());
        assert_eq!(rdr.headers().unwrap().len(), 17);
        for rec in rdr.records() {
            let rec = rec.unwrap();
            for i in 1..rec.len() {
                assert!(rec[i].parse::<f64>().is_ok(), "column {i}");
            }
        }
    }

    #[test]
    fn reward_is_the_last_column() {
        let mut r = record(0);
        r.cost = 0.25;
        r.reward = -0.25;
        let out = render(&[("ES10", vec![r])]);
        let row = out.lines().nth(1).unwrap();
        assert!(row.ends_with(",0.250000,0.000000,-0.250000"), "{row}");
    }

    #[test]
    fn deterministic_output() {
        let logs = [("ES10", (0..5).map(record).collect::<Vec<_>>())];
        assert_eq!(render(&logs), render(&logs));
    }
}
