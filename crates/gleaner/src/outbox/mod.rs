/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Transactional outbox: routing, broker abstraction, and the publisher.

pub mod broker;
pub mod publisher;
pub mod routing;

pub use broker::{Broker, BrokerMessage, InMemoryBroker};
pub use publisher::OutboxPublisher;
pub use routing::{destination_for, event_types, Destination};

#[cfg(feature = "kafka")]
pub use broker::KafkaBroker;
