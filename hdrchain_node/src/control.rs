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

//! Named extension point for the local control interface (spec §6 "a
//! local datagram socket, `node.sock`"). The socket itself is an explicit
//! Non-goal; this trait exists only so a future implementation has
//! somewhere to plug in without the node binary needing to change shape.

/// Out-of-process control surface a node could expose (status queries,
/// shutdown request, ...). No implementation ships here -- the Non-goal
/// covers the transport, not the idea of having one.
pub trait ControlInterface: Send + Sync {
	/// Human-readable one-line status, e.g. for a `status` command.
	fn status(&self) -> String;
}

/// A `ControlInterface` that reports a fixed string; used where the node
/// needs *some* implementation to wire together but nothing queries it.
pub struct NullControlInterface;

impl ControlInterface for NullControlInterface {
	fn status(&self) -> String {
		"control interface not implemented".to_string()
	}
}
