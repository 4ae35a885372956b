// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: devpmctl entrypoint

fn main() {
    env_logger::init();
    std::process::exit(devpmctl::run());
}
