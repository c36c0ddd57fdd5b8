use std::fs::File;
use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

mod aggregators;
mod dashboard;
mod filters;
mod records;
mod tables;

use dashboard::{ChartAdapter, Dashboard, DashboardConfig, DashboardEngine};
use filters::Dimension;
use records::MemoryStore;

#[derive(Parser)]
#[clap(version = "0.1.0", author = "Vance Longwill <vancelongwill@gmail.com>")]
struct Opts {
    /// CSV file of sales records, or of orders when --customers and --products are given
    file: String,
    /// CSV file of customers to join orders against
    #[clap(long, requires = "products")]
    customers: Option<String>,
    /// CSV file of products to join orders against
    #[clap(long, requires = "customers")]
    products: Option<String>,
    /// Only include orders from this year
    #[clap(long)]
    year: Vec<String>,
    /// Only include this roast type
    #[clap(long)]
    roast: Vec<String>,
    /// Only include this size
    #[clap(long)]
    size: Vec<String>,
    /// Only include customers with this loyalty card status
    #[clap(long)]
    loyalty: Vec<String>,
    /// Number of customers in the top customers chart
    #[clap(long, default_value_t = 5)]
    top: usize,
    /// Read `<dimension> <value>` toggles from stdin after the first render
    #[clap(long)]
    interactive: bool,
}

/// JsonAdapter writes each dashboard as a single line of JSON
struct JsonAdapter<W: Write> {
    writer: W,
    last: Option<Dashboard>,
}

impl<W: Write> JsonAdapter<W> {
    fn new(writer: W) -> JsonAdapter<W> {
        JsonAdapter { writer, last: None }
    }
}

impl<W: Write> ChartAdapter for JsonAdapter<W> {
    fn render(&mut self, dashboard: &Dashboard) -> Result<()> {
        if self.last.as_ref() == Some(dashboard) {
            debug!("Dashboard unchanged, skipping render");
            return Ok(());
        }
        serde_json::to_writer(&mut self.writer, dashboard)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        self.last = Some(dashboard.clone());
        Ok(())
    }
}

enum Command {
    Clear,
    Toggle(Dimension, String),
}

/// parse_command reads one line of interactive input. Blank lines are `None`.
fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.eq_ignore_ascii_case("clear") {
        return Ok(Some(Command::Clear));
    }
    let (dimension, value) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| anyhow!("expected `<dimension> <value>`, got {:?}", line))?;
    let dimension: Dimension = dimension.parse()?;
    Ok(Some(Command::Toggle(dimension, value.trim().to_string())))
}

/// handle_command applies one line of interactive input. Malformed input is
/// logged and skipped; a failed redraw is returned to the caller.
fn handle_command(engine: &mut DashboardEngine, line: &str) -> Result<()> {
    let command = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(()),
        Err(e) => {
            warn!(error = e.to_string(), input = line, "Ignoring command");
            return Ok(());
        }
    };
    match command {
        Command::Clear => engine.clear(),
        Command::Toggle(dimension, value) => {
            engine.set_filter(dimension, &value)?;
            info!(
                dimension = dimension.to_string(),
                value = value.as_str(),
                active = engine.filters().is_active(dimension, &value),
                "Filter set"
            );
            Ok(())
        }
    }
}

fn run() -> Result<()> {
    let opts: Opts = Opts::parse();

    let store = match (&opts.customers, &opts.products) {
        (Some(customers), Some(products)) => MemoryStore::new(tables::join(
            File::open(&opts.file)?,
            File::open(customers)?,
            File::open(products)?,
        )?),
        _ => MemoryStore::from_reader(File::open(&opts.file)?)?,
    };
    let mut adapter = JsonAdapter::new(io::stdout());
    let config = DashboardConfig {
        top_customers: opts.top,
        ..DashboardConfig::default()
    };
    let mut engine = DashboardEngine::new(&store, &mut adapter, config);

    let toggles = [
        (Dimension::Year, &opts.year),
        (Dimension::Roast, &opts.roast),
        (Dimension::Size, &opts.size),
        (Dimension::Loyalty, &opts.loyalty),
    ];
    for (dimension, values) in toggles {
        for value in values {
            engine.toggle(dimension, value);
        }
    }
    if !engine.filters().is_empty() {
        debug!(filters = ?engine.filters(), "Applied command line filters");
    }
    engine.refresh()?;

    if opts.interactive {
        for line in io::stdin().lock().lines() {
            handle_command(&mut engine, &line?)?;
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    if let Err(e) = run() {
        error!(error = e.to_string(), "Something went wrong");
        std::process::exit(1);
    }
}
