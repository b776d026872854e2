use gwagent::cli::Args;

pub fn main() -> anyhow::Result<()> {
    gwlogger::init();
    let args: Args = argh::from_env();
    args.run()
}
