#![allow(clippy::exit)]

use crate::runner::{Runner, RunnerError};
use crate::testcase::collect_test_dirs;
use anyhow::Result;
use libtest_mimic::{Arguments, Failed, Trial};
use spvasm_compute::{BuildOptions, Context, HarnessConfig};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{self, ExitCode};
use std::sync::Arc;
use tracing_subscriber::FmtSubscriber;

mod runner;
mod testcase;

fn main() -> Result<ExitCode> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global subscriber");

    let mut args = Arguments::from_args();
    // Cases share one device queue; run them one after another.
    args.test_threads = Some(1);

    // If filters are provided that look like paths (contain '/'), convert them to test names
    if let Some(filter) = &mut args.filter {
        *filter = filter.replace('/', "::");
    }

    let tests = collect_tests()?;
    Ok(libtest_mimic::run(&args, tests).exit_code())
}

fn load_config() -> Result<HarnessConfig, RunnerError> {
    match env::var_os("SPVASM_CONFIG") {
        Some(path) => {
            tracing::debug!("Reading harness config from {}", Path::new(&path).display());
            HarnessConfig::from_path(&path).map_err(|e| RunnerError::Config {
                msg: format!("{e:#}"),
            })
        }
        None => Ok(HarnessConfig::default()),
    }
}

fn cases_dir() -> Result<PathBuf> {
    let base = match env::var_os("SPVASM_CASES_DIR") {
        Some(dir) => PathBuf::from(dir),
        // Find the manifest directory at compile time and locate cases in ../cases.
        None => Path::new(env!("CARGO_MANIFEST_DIR")).join("../cases"),
    };
    Ok(base.canonicalize()?)
}

fn collect_tests() -> Result<Vec<Trial>> {
    let base = cases_dir()?;
    tracing::debug!("Using cases directory: {}", base.display());

    let config = load_config()?;
    let options = BuildOptions::from_config(&config)?;

    let test_cases = collect_test_dirs(&base)?;
    if test_cases.is_empty() {
        eprintln!("No valid tests found in {}", base.display());
        process::exit(1);
    }

    let context = match Context::new(&config) {
        Ok(context) => Some(Arc::new(context)),
        Err(e) => {
            tracing::error!("No usable Vulkan device, ignoring all cases: {:#}", e);
            None
        }
    };

    let trials = test_cases
        .into_iter()
        .map(|case| match &context {
            Some(context) => {
                let runner = Runner {
                    context: context.clone(),
                    options,
                };
                Trial::test(case.to_string(), move || Ok(runner.run_test_case(&case)?))
            }
            None => Trial::test(case.to_string(), || {
                Err(Failed::from("No usable Vulkan device"))
            })
            .with_ignored_flag(true),
        })
        .collect();
    Ok(trials)
}
