use cfgstore_cli::{command, init_tracing, run};

fn main() -> anyhow::Result<()> {
    let matches = command().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let stdout = std::io::stdout();
    run(&matches, &mut stdout.lock())
}
