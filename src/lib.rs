//! The library code for the `commitblog` static blog generator. A run can be
//! broken down into two distinct steps:
//!
//! 1. Writing posts for new commits ([`crate::github`] or [`crate::git`],
//!    [`crate::classify`], [`crate::write`])
//! 2. Rebuilding the index from the posts on disk ([`crate::index`])
//!
//! The first step lists the repository's commits, drops documentation-only
//! changes, and renders one post per remaining commit through the post
//! template. A commit's post file name is derived from the commit alone, so
//! commits that already have a post are recognized by listing the posts
//! directory and are left alone.
//!
//! The second step doesn't know about commits at all: it reads the title,
//! date, tags and excerpt back out of every post file, sorts them newest
//! first, and renders the index template. Hand-written posts that carry the
//! same markers are indexed too.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod classify;
pub mod commit;
pub mod config;
pub mod git;
pub mod github;
pub mod index;
pub mod markdown;
pub mod post;
pub mod template;
pub mod util;
pub mod write;
