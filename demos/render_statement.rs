use pnl_drilldown::*;
use std::env;
use std::path::PathBuf;

fn main() {
    let source = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("base.xlsx"));

    let config = match env::args().nth(2) {
        Some(config_path) => ReportConfig::from_json_file(std::path::Path::new(&config_path))
            .expect("config should be valid JSON"),
        None => ReportConfig::new(source),
    };

    let mut pipeline = StatementPipeline::new(config).expect("config should validate");
    let mut sessions = SessionStore::new();
    let session = sessions.session_mut("demo");

    let view = match pipeline.render(session) {
        Ok(view) => view,
        Err(e) => {
            eprintln!("Could not render statement: {}", e);
            return;
        }
    };

    println!("Years: {:?}", view.options.years);
    println!("Months: {:?}", view.options.months);
    println!("\nCollapsed statement:\n{}", rows_to_text_table(&view.rows));

    // Open every row the policy allows, one click at a time.
    let mut rows = view.rows;
    loop {
        let next = rows
            .iter()
            .find(|r| r.expandable && !r.expanded)
            .map(RowSelection::from);
        let Some(selection) = next else { break };

        if !pipeline.select_row(session, Some(&selection)).is_requested() {
            break;
        }
        rows = pipeline
            .render(session)
            .expect("source was readable a moment ago")
            .rows;
    }

    println!("Fully expanded statement:\n{}", rows_to_text_table(&rows));
    println!("Expanded nodes:");
    for id in session.expansion.iter() {
        println!(" - {}", id);
    }
}
