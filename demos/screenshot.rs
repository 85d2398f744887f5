use futures::StreamExt;

use cdpdrive::browser::{Browser, BrowserConfig};
use cdpdrive::query::Predicate;

#[async_std::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (browser, mut handler) = Browser::launch(BrowserConfig::default()).await?;

    let handle = async_std::task::spawn(async move {
        loop {
            let _ = handler.next().await.unwrap();
        }
    });

    let page = browser.new_page("https://news.ycombinator.com/").await?;

    // wait until the listing has rendered, then pull the title of the top post
    let rows = cdpdrive::query::wait_for(
        &page,
        "table.itemlist tr.athing".into(),
        Predicate::AtLeastN(1),
        std::time::Duration::from_millis(200),
        std::time::Duration::from_secs(10),
    )
    .await?;

    println!("found {} posts rendered so far", rows.len());

    let title: String = page
        .evaluate("document.querySelector('span.titleline a').textContent")
        .await?
        .into_value()?;
    println!("top post title: {title}");

    page.close().await?;
    handle.await;
    Ok(())
}
