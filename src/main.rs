use anyhow::Result;
use clap::Parser;
use log::info;

use shading_lab::app::{run_interactive, WindowInitError, WindowSettings};
use shading_lab::{run_headless, CliOptions, DemoConfig, DemoVariant};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse();
    if options.list {
        list_variants()?;
        return Ok(());
    }

    let config = options.demo()?;
    info!("loaded demo {} ({})", config.name, config.title);

    if options.headless {
        return headless(&options, config);
    }

    let settings = WindowSettings {
        width: options.width,
        height: options.height,
        vsync: !options.no_vsync,
    };
    match run_interactive(config.clone(), settings) {
        Ok(state) => {
            print!("{state}");
            Ok(())
        }
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!("{err}. Falling back to --headless mode (set DISPLAY or install a GPU driver to enable rendering).");
            headless(&options, config)
        }
        Err(err) => Err(err),
    }
}

fn headless(options: &CliOptions, config: DemoConfig) -> Result<()> {
    let scripted = options.headless_options(&config)?;
    let report = run_headless(config, &scripted)?;
    report.print();
    Ok(())
}

fn list_variants() -> Result<()> {
    for variant in DemoVariant::ALL {
        let config = DemoConfig::builtin(variant)?;
        println!("{:<16} {}", variant.name(), config.title);
    }
    Ok(())
}
