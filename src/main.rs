fn main() -> std::process::ExitCode {
    ktl_storefront_lib::run()
}
