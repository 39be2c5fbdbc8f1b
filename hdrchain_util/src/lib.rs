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

//! Logging init and the process-wide mock/real clock, factored out the way
//! the teacher's `util` crate factors logging and other cross-cutting
//! low-level helpers.

extern crate env_logger;
extern crate log;

pub mod clock;
pub mod logger;

pub use clock::{set_mock_time, Clock, RealClock};
pub use logger::init_logger;
