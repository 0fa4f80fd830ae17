use kernel_info::memory;
use std::{env, path::PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("kernel.ld");

    let image_base = memory::KERNEL_IMAGE_BASE;
    assert!(
        image_base >= memory::KERNEL_VIRTUAL_BASE,
        "KERNEL_IMAGE_BASE must be in the kernel half (got {image_base:#x})"
    );

    println!("cargo:rerun-if-changed={}", ld.display());

    // Host builds (tests) link normally.
    let bare_metal = env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "none")
        && env::var("CARGO_CFG_TARGET_ARCH").is_ok_and(|arch| arch == "x86");
    if !bare_metal {
        return;
    }

    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());
    println!("cargo:rustc-link-arg-bins=--defsym=KERNEL_IMAGE_BASE={image_base:#x}");
}
