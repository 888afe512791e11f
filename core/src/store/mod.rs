/*
 * mod.rs
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

//! Persistence seams: the seed registry (tracked mailboxes) and the
//! message store (captured newsletters). The sync orchestrator takes
//! these as explicit handles so tests can substitute doubles.

mod error;
mod message;
mod seed;

pub use error::StoreError;
pub use message::{MessageStore, NewsletterInsert};
pub use seed::{Provider, Seed, SeedRegistry};
