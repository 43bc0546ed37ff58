fn main() -> lectern_view::Result<()> {
    example::run()
}
