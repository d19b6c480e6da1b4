#[cfg(not(windows))]
mod fuzz {
    use bringup::format::dtbo;
    use honggfuzz::fuzz;

    pub fn main() {
        loop {
            fuzz!(|data: &[u8]| {
                if let Ok(table) = dtbo::parse_dtbo_table(data) {
                    let _ = dtbo::export_entries(&table, data);
                }
            });
        }
    }
}

fn main() {
    #[cfg(not(windows))]
    fuzz::main();
}
