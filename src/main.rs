fn main() -> anyhow::Result<()> {
    scummgen_rust::run()
}
