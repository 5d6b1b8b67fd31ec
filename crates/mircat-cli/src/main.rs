//! mircat-cli - run the MIRcat laser through one bench procedure
//!
//! connect → arm → tune → emission on → optional scan → shutdown, printing
//! every step as one JSON line. A missing safety interlock or key switch
//! terminates the process immediately.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use irspec_mircat::sdk::{StepMeasureParams, SweepParams};
use irspec_mircat::{
    run_sequence, CancellationToken, InterlockPolicy, LaserSession, MircatConfig, ScanRequest,
    SequencePlan, TuneRequest, WavelengthUnits,
};
use serde::Deserialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Units {
    Microns,
    Wavenumbers,
}

impl From<Units> for WavelengthUnits {
    fn from(units: Units) -> Self {
        match units {
            Units::Microns => WavelengthUnits::Microns,
            Units::Wavenumbers => WavelengthUnits::Wavenumbers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScanMode {
    Sweep,
    StepMeasure,
}

#[derive(Parser, Debug)]
#[command(name = "mircat-cli")]
#[command(author, version, about = "MIRcat laser bench procedure")]
struct Cli {
    /// Wavelength to tune to before emitting
    #[arg(short, long)]
    wavelength: f32,

    /// Units of every wavelength argument
    #[arg(short, long, value_enum, default_value = "microns")]
    units: Units,

    /// QCL to tune
    #[arg(short, long, default_value = "1")]
    qcl: u8,

    /// Scan to run once emitting
    #[arg(long, value_enum, requires_all = ["start", "stop"])]
    scan: Option<ScanMode>,

    /// Scan start wavelength
    #[arg(long)]
    start: Option<f32>,

    /// Scan stop wavelength
    #[arg(long)]
    stop: Option<f32>,

    /// Sweep speed in units per second
    #[arg(long, default_value = "0.1")]
    speed: f32,

    /// Step size for step-measure scans
    #[arg(long, default_value = "0.1")]
    step: f32,

    /// Number of scan repetitions
    #[arg(long, default_value = "1")]
    num_scans: u8,

    /// Hardware configuration file; only `[daylight_mircat]` is read
    #[arg(short, long, env = "IRSPEC_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Default, Deserialize)]
struct BenchFile {
    #[serde(default)]
    daylight_mircat: MircatConfig,
}

fn load_config(path: Option<&Path>) -> Result<MircatConfig> {
    let Some(path) = path else {
        return Ok(MircatConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let file: BenchFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(file.daylight_mircat)
}

impl Cli {
    fn plan(&self) -> Result<SequencePlan> {
        let units = WavelengthUnits::from(self.units);
        let scan = match (self.scan, self.start, self.stop) {
            (None, _, _) => None,
            (Some(mode), Some(start), Some(stop)) => Some(match mode {
                ScanMode::Sweep => ScanRequest::Sweep(SweepParams {
                    start,
                    stop,
                    speed: self.speed,
                    units,
                    num_scans: u16::from(self.num_scans),
                    bidirectional: false,
                    qcl: self.qcl,
                }),
                ScanMode::StepMeasure => ScanRequest::StepMeasure(StepMeasureParams {
                    start,
                    stop,
                    step: self.step,
                    units,
                    num_scans: self.num_scans,
                }),
            }),
            (Some(_), _, _) => bail!("--scan needs both --start and --stop"),
        };
        if let Some(scan) = &scan {
            scan.validate()?;
        }

        Ok(SequencePlan {
            tune: TuneRequest {
                wavelength: self.wavelength,
                units,
                qcl: self.qcl,
            },
            scan,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let plan = cli.plan()?;
    let mut config = load_config(cli.config.as_deref())?;
    config.on_interlock_failure = InterlockPolicy::Abort;
    let session = LaserSession::from_config(config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, shutting the laser down");
            on_interrupt.cancel();
        }
    });

    let report = run_sequence(&session, &plan, &cancel).await;
    for step in &report.steps {
        println!("{}", serde_json::to_string(step)?);
    }

    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mircat-cli").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_tune_only_plan() {
        let plan = parse(&["-w", "1050", "-u", "wavenumbers", "-q", "2"])
            .plan()
            .unwrap();
        assert_eq!(plan.tune.wavelength, 1050.0);
        assert_eq!(plan.tune.units, WavelengthUnits::Wavenumbers);
        assert_eq!(plan.tune.qcl, 2);
        assert!(plan.scan.is_none());
    }

    #[test]
    fn test_step_measure_plan() {
        let plan = parse(&[
            "-w", "7.0", "--scan", "step-measure", "--start", "6.7", "--stop", "7.2", "--step",
            "0.05",
        ])
        .plan()
        .unwrap();
        match plan.scan {
            Some(ScanRequest::StepMeasure(p)) => {
                assert_eq!(p.step, 0.05);
                assert_eq!(p.units, WavelengthUnits::Microns);
                assert_eq!(p.num_scans, 1);
            }
            other => panic!("unexpected scan {:?}", other),
        }
    }

    #[test]
    fn test_scan_needs_bounds() {
        let result = Cli::try_parse_from(["mircat-cli", "-w", "7.0", "--scan", "sweep"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_scan_is_rejected() {
        let cli = parse(&[
            "-w", "7.0", "--scan", "sweep", "--start", "7.0", "--stop", "7.0",
        ]);
        assert!(cli.plan().is_err());
    }

    #[test]
    fn test_config_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hardware_configuration.toml");
        std::fs::write(
            &path,
            "[arduino_uno_r4]\nport = \"COM3\"\n\n[daylight_mircat]\nscan_poll_ms = 50\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.scan_poll_ms, 50);
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
        assert_eq!(load_config(None).unwrap().scan_poll_ms, 300);
    }
}
