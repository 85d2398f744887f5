use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use cdpdrive::allocator::ExecAllocator;
use cdpdrive::browser::BrowserConfig;
use cdpdrive::context::Context;
use cdpdrive::query::Predicate;

#[async_std::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let ctx = Context::new(Arc::new(ExecAllocator::new()), BrowserConfig::default());

    let goto_rust_page = |page: &cdpdrive::page::Page| {
        let page = page.clone();
        async move {
            page.goto("https://en.wikipedia.org/wiki/Rust_(programming_language)")
                .await?;
            Ok(())
        }
        .boxed()
    };

    let response = ctx
        .run_response(&goto_rust_page, Duration::from_secs(15))
        .await?;
    println!("loaded {} (status {:?})", response.url, response.response.map(|r| r.status));

    let heading = ctx
        .wait_for(
            "h1#firstHeading",
            Predicate::Visible,
            Duration::from_millis(200),
            Duration::from_secs(5),
        )
        .await?;
    println!("found {} matching heading element(s)", heading.len());

    ctx.cancel().await?;
    Ok(())
}
