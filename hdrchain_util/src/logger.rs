// Copyright 2016 The Grin Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Idempotent logger initialization. Unlike the teacher's `log4rs`-based
//! `LOGGER` singleton, this crate targets the plain `log` facade (the
//! stack the newer parts of the pack, and this spec's "Logging" ambient
//! section, call for) but keeps the same "init once, call from main and
//! from tests alike" shape.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the global logger exactly once. Safe to call from every
/// test and from `main`; subsequent calls are no-ops.
pub fn init_logger() {
	INIT.call_once(|| {
		let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
			.is_test(cfg!(test))
			.try_init();
	});
}
