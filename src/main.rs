use std::{fs::File,
          io::{self, BufWriter, Write},
          path::PathBuf,
          process::ExitCode};
use anyhow::{Context, Result};
use clap::Parser;
use choropleth::{Choropleth, MapConfig};

/// Draw a county choropleth map as SVG.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON configuration; built-in defaults when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// CSV file of observations (overrides the configuration).
    #[arg(short, long)]
    data: Option<PathBuf>,
    /// TopoJSON file of counties and states (overrides the configuration).
    #[arg(short, long)]
    geometry: Option<PathBuf>,
    /// Where to write the SVG; standard output by default.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Only draw the legend; no input file is read.
    #[arg(long)]
    legend_only: bool,
}

fn write_out(path: Option<&PathBuf>, f: impl FnOnce(&mut dyn Write) -> io::Result<()>)
             -> Result<()> {
    match path {
        Some(p) => {
            let mut fh = BufWriter::new(File::create(p)
                .with_context(|| format!("cannot create {}", p.display()))?);
            f(&mut fh)?;
            fh.flush()?;
        }
        None => {
            let mut fh = io::stdout().lock();
            f(&mut fh)?;
            fh.flush()?;
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(p) => MapConfig::from_path(p)
            .with_context(|| format!("invalid configuration {}", p.display()))?,
        None => MapConfig::default(),
    };
    if let Some(d) = args.data { config.data_path = d }
    if let Some(g) = args.geometry { config.geometry_path = g }
    let map = Choropleth::new(config)?;
    let scene = if args.legend_only {
        map.legend_scene()
    } else {
        let (topology, observations) = map.load().context("cannot load the map")?;
        map.scene(&topology, &observations)?
    };
    write_out(args.output.as_ref(), |mut fh| scene.write_svg(&mut fh))?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
