fn main() -> anyhow::Result<()> {
    rootbox_cli::run()
}
