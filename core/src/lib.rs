/*
 * lib.rs
 * Copyright (C) 2026 Letterseed developers
 *
 * This file is part of Letterseed, a newsletter-tracking service.
 *
 * Letterseed is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Letterseed is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Letterseed.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Letterseed core: pulls newsletters from user-owned mailboxes over IMAP
//! when webhook ingestion is unavailable, and hands them to the message
//! store through explicit persistence seams.
//!
//! Layout mirrors the service split: `protocol::imap` owns the wire
//! protocol, `store` owns the persistence record types and traits, `sync`
//! drives one full mailbox sync per invocation.

pub mod net;
pub mod protocol;
pub mod store;
pub mod sync;
