#[cfg(not(windows))]
mod fuzz {
    use std::io::Cursor;

    use bringup::{format::bootimage::BootImage, stream::FromReader};
    use honggfuzz::fuzz;

    pub fn main() {
        loop {
            fuzz!(|data: &[u8]| {
                let reader = Cursor::new(data);
                if let Ok(image) = BootImage::from_reader(reader) {
                    let _ = image.components();
                }
            });
        }
    }
}

fn main() {
    #[cfg(not(windows))]
    fuzz::main();
}
