#[cfg(not(windows))]
mod fuzz {
    use bringup::kernel::{self, KernelOptions};
    use honggfuzz::fuzz;

    pub fn main() {
        let options = KernelOptions {
            max_decompressed_size: 1024 * 1024,
            ..Default::default()
        };

        loop {
            fuzz!(|data: &[u8]| {
                let _ = kernel::recover_version(data, options);
                let _ = kernel::recover_ikconfig(data, options);
            });
        }
    }
}

fn main() {
    #[cfg(not(windows))]
    fuzz::main();
}
