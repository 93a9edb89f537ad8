fn main() -> anyhow::Result<()> {
    study_sim::run()
}
