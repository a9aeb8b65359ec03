// dkim-domain-proof – domain ownership proofs from DKIM-signed email
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

use dkim_domain_proof::{Config, MemorySessionStore, Session, Verifier};
use hickory_resolver::TokioAsyncResolver;
use std::{
    env, process,
    time::{Duration, SystemTime},
};
use tokio::io::{self, AsyncReadExt};

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut args = env::args();

    let program = args.next();
    let (domain, nonce) = match (args.next(), args.next(), args.next()) {
        (Some(domain), Some(nonce), None) => (domain, nonce),
        _ => {
            eprintln!(
                "usage: {} <domain> <nonce> < message",
                program.as_deref().unwrap_or("verify")
            );
            process::exit(1);
        }
    };

    let mut msg = String::new();
    let n = io::stdin().read_to_string(&mut msg).await.unwrap();
    assert!(n > 0, "empty message on stdin");

    let sessions = MemorySessionStore::new();
    sessions.insert(Session::new(
        "demo",
        &domain,
        nonce,
        SystemTime::now(),
        Duration::from_secs(600),
    ));

    let resolver = TokioAsyncResolver::tokio(Default::default(), Default::default());

    let verifier = Verifier::new(resolver, sessions, Config::default());

    let has_body = msg.contains("\n\n") || msg.contains("\r\n\r\n");

    let outcome = if has_body {
        verifier.verify_message(&msg, "demo").await
    } else {
        verifier.verify_headers(&msg, "demo").await
    };

    println!("{:?}", outcome.status);
    println!("state: {:?}", outcome.state());

    if let (Some(domain), Some(domain_id)) = (&outcome.domain, &outcome.domain_id) {
        println!("domain: {domain}");
        println!("domain id: {domain_id}");
    }
    if let Some(subject) = &outcome.subject {
        println!("subject: {subject}");
    }

    if !outcome.is_ok() {
        process::exit(2);
    }
}
