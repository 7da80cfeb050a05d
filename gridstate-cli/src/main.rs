mod error;
mod server;

use std::fs::{self, File};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gridstate_lib::selection::AllRecordsBanner;
use gridstate_lib::{
    Alignment, Column, ExpandStatus, Grid, GridConfig, GridEvent, Record, ViewportMetrics,
};
use simplelog::{Config, LevelFilter, WriteLogger};

use error::ConfigError;
use server::{FolderServer, PeopleServer, SeniorBadge};

#[derive(Parser)]
#[command(name = "gridstate")]
#[command(about = "Scripted data grid sessions against a simulated backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log file
    #[arg(long, default_value = "gridstate.log", global = true)]
    log_file: PathBuf,

    /// Log state transitions at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    /// JSON grid config (any subset of fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Page through a large dataset: scroll, sort, select everything
    Paged {
        #[arg(long, default_value = "200")]
        total: u64,

        #[arg(long, default_value = "50")]
        latency_ms: u64,

        /// Fail every n-th block request (0 disables)
        #[arg(long, default_value = "0")]
        fail_every: usize,
    },
    /// Expand and collapse a lazily loaded folder tree
    Tree {
        #[arg(long, default_value = "3")]
        roots: u64,

        #[arg(long, default_value = "50")]
        latency_ms: u64,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<GridConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(GridConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    match File::create(&cli.log_file) {
        Ok(file) => {
            if let Err(e) = WriteLogger::init(level, Config::default(), file) {
                eprintln!("Error: {}", e);
            }
        }
        Err(e) => eprintln!("Error: {}: {}", cli.log_file.display(), e),
    }

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    log::info!("config: {:?}", config);

    match cli.command {
        Commands::Paged {
            total,
            latency_ms,
            fail_every,
        } => {
            let server = PeopleServer::new(total, Duration::from_millis(latency_ms))
                .with_fail_every(fail_every);
            paged_session(config.with_total_records(total as usize), server).await;
        }
        Commands::Tree { roots, latency_ms } => {
            let server = FolderServer::new(Duration::from_millis(latency_ms), 999);
            tree_session(config, server, roots).await;
        }
    }
}

fn people_columns() -> Vec<Column<Record>> {
    vec![
        Column::new("id", "#")
            .align(Alignment::Right)
            .render(|r: &Record| r.id.to_string()),
        Column::new("name", "Name").sortable(),
        Column::new("age", "Age").sortable().align(Alignment::Right),
    ]
}

async fn paged_session(config: GridConfig, server: PeopleServer) {
    let grid = Grid::new(people_columns())
        .with_config(config)
        .with_block_fetcher(server)
        .with_row_decorator(SeniorBadge);

    println!("== first viewport");
    grid.on_viewport_change(0, 9).await;
    print_rows(&grid, 10);

    println!("== scroll to the bottom");
    let near_bottom = ViewportMetrics {
        scroll_height: 3000.0,
        scroll_top: 2400.0,
        client_height: 400.0,
    };
    grid.on_scroll_near_bottom(near_bottom).await;
    println!("{} rows loaded", grid.visible_rows().len());

    println!("== sort by age, twice");
    grid.on_header_click("age").await;
    grid.on_header_click("age").await;
    print_rows(&grid, 5);
    if let Some(first) = grid.visible_rows().first() {
        grid.on_row_double_click(first.row.id);
    }

    println!("== select the loaded rows, then all records");
    grid.on_header_checkbox_toggle();
    print_banner(&grid);
    grid.enter_all_records_mode();
    if let Some(row) = grid.visible_rows().get(2) {
        grid.on_row_checkbox_toggle(row.row.id, false, false);
    }
    print_banner(&grid);
    let summary = grid.selection_summary();
    println!(
        "selected {} (excluded {:?})",
        summary.count, summary.excluded_ids
    );

    print_events(&grid);
}

async fn tree_session(config: GridConfig, server: FolderServer, roots: u64) {
    let columns = vec![Column::new("name", "Folder")];
    let grid = Grid::new(columns)
        .with_config(config)
        .with_rows(server.roots(roots))
        .with_child_fetcher(server);

    println!("== expand folder-1");
    grid.on_expand_icon_click(&1).await;
    print_rows(&grid, usize::MAX);

    println!("== expand folder-12");
    grid.on_expand_icon_click(&12).await;
    print_rows(&grid, usize::MAX);

    println!("== shift-select folder-11 to folder-2");
    grid.on_row_checkbox_toggle(11, false, true);
    grid.on_row_checkbox_toggle(2, true, true);
    print_rows(&grid, usize::MAX);

    println!("== collapse folder-1");
    grid.on_expand_icon_click(&1).await;
    print_rows(&grid, usize::MAX);

    print_events(&grid);
}

fn pad(text: &str, width: usize, align: Alignment) -> String {
    match align {
        Alignment::Left => format!("{:<width$}", text),
        Alignment::Center => format!("{:^width$}", text),
        Alignment::Right => format!("{:>width$}", text),
    }
}

fn print_rows(grid: &Grid<Record>, limit: usize) {
    let columns = grid.columns();
    let header: Vec<String> = columns
        .iter()
        .map(|c| {
            let marker = match grid.sort_descriptor() {
                Some(sort) if sort.column_id == c.key && sort.descending => " v",
                Some(sort) if sort.column_id == c.key => " ^",
                _ => "",
            };
            pad(&format!("{}{}", c.title, marker), 14, c.align)
        })
        .collect();
    println!("       {}", header.join(" "));

    for view in grid.visible_rows().into_iter().take(limit) {
        let check = if view.is_selected { "[x]" } else { "[ ]" };
        let icon = match view.expand_status {
            ExpandStatus::Expand => "+",
            ExpandStatus::Collapse => "-",
            ExpandStatus::Loading => "~",
            ExpandStatus::None => " ",
        };
        let cells: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let indent = if i == 0 { "  ".repeat(view.level) } else { String::new() };
                pad(&format!("{}{}", indent, c.cell_text(&view.row)), 14, c.align)
            })
            .collect();
        let badge = view
            .status
            .as_ref()
            .and_then(|s| s.get("badge"))
            .and_then(|b| b.as_str())
            .unwrap_or("");
        println!("{} {}  {} {}", check, icon, cells.join(" "), badge);
    }
}

fn print_banner(grid: &Grid<Record>) {
    match grid.all_records_banner() {
        Some(AllRecordsBanner::Offer { selected, total }) => {
            println!("All {} rows on this page are selected. Select all {}?", selected, total)
        }
        Some(AllRecordsBanner::AllSelected { total }) => {
            println!("All {} records are selected.", total)
        }
        None => {}
    }
}

fn print_events(grid: &Grid<Record>) {
    for event in grid.drain_events() {
        match event {
            GridEvent::SelectionChanged(ids) => println!("event: selection {:?}", ids),
            GridEvent::AllRecordsModeChanged(on) => println!("event: all records {}", on),
            GridEvent::SortChanged(sort) => println!("event: sort {:?}", sort),
            GridEvent::RowActivated(id) => println!("event: activated {}", id),
            GridEvent::BlockFailed { start_row, end_row } => {
                println!("event: rows {}..{} failed", start_row, end_row)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_defaults_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config.block_size, GridConfig::default().block_size);
    }

    #[test]
    fn test_load_config_partial_file() {
        let path = std::env::temp_dir().join(format!("gridstate-config-{}.json", std::process::id()));
        fs::write(&path, r#"{ "block_size": 50 }"#).unwrap();

        let config = load_config(Some(&path));
        let _ = fs::remove_file(&path);

        let config = config.unwrap();
        assert_eq!(config.block_size, 50);
        assert_eq!(config.row_buffer, GridConfig::default().row_buffer);
    }

    #[test]
    fn test_load_config_errors() {
        let missing = PathBuf::from("/nonexistent/gridstate.json");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));

        let path = std::env::temp_dir().join(format!("gridstate-bad-{}.json", std::process::id()));
        fs::write(&path, "not json").unwrap();
        let result = load_config(Some(&path));
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
