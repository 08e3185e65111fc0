fn main() -> anyhow::Result<()> {
    revpk::cli::run_cli()
}
